use anyhow::Result;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: String,
    pub cache_incidents_ttl_secs: u64,
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub queue_max_retries: u32,
    pub queue_task_timeout_secs: u64,
    pub queue_concurrency: usize,
    pub webhook_url: String,
    pub webhook_request_timeout_secs: u64,
    pub webhook_max_idle_per_host: usize,
    pub webhook_idle_timeout_secs: u64,
    pub stats_window_minutes: i64,
    pub async_job_timeout_secs: u64,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "geo_alerts".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "geo".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "geo".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
        let redis_port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        let redis_db = env::var("REDIS_DB").unwrap_or_else(|_| "0".to_string());
        let redis_url = match env::var("REDIS_PASSWORD") {
            Ok(pwd) if !pwd.is_empty() => {
                format!("redis://:{}@{}:{}/{}", pwd, redis_host, redis_port, redis_db)
            }
            _ => format!("redis://{}:{}/{}", redis_host, redis_port, redis_db),
        };

        let cache_incidents_ttl_secs = env::var("CACHE_INCIDENTS_TTL")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        let kafka_bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_topic =
            env::var("KAFKA_TOPIC").unwrap_or_else(|_| "geo-alerts-webhooks".to_string());
        let kafka_group_id =
            env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "geo-alerts-webhook-worker".to_string());
        let kafka_auto_offset_reset =
            env::var("KAFKA_AUTO_OFFSET_RESET").unwrap_or_else(|_| "earliest".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "SCRAM-SHA-256".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "PLAINTEXT".to_string());
        let kafka_max_retries = env::var("KAFKA_MAX_RETRIES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let kafka_circuit_breaker_cooldown = env::var("KAFKA_CIRCUIT_BREAKER_COOLDOWN")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let queue_max_retries = env::var("QUEUE_MAX_RETRIES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let queue_task_timeout_secs = env::var("QUEUE_TASK_TIMEOUT")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let queue_concurrency = env::var("QUEUE_CONCURRENCY")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let webhook_url =
            env::var("WEBHOOK_URL").unwrap_or_else(|_| "http://localhost:9090".to_string());
        let webhook_request_timeout_secs = env::var("WEBHOOK_REQUEST_TIMEOUT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let webhook_max_idle_per_host = env::var("WEBHOOK_MAX_IDLE_PER_HOST")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        let webhook_idle_timeout_secs = env::var("WEBHOOK_IDLE_TIMEOUT")
            .unwrap_or_else(|_| "90".to_string())
            .parse()
            .unwrap_or(90);

        let stats_window_minutes = env::var("STATS_TIME_WINDOW_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let async_job_timeout_secs = env::var("ASYNC_JOB_TIMEOUT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            db_max_connections,
            redis_url,
            cache_incidents_ttl_secs,
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            queue_max_retries,
            queue_task_timeout_secs,
            queue_concurrency,
            webhook_url,
            webhook_request_timeout_secs,
            webhook_max_idle_per_host,
            webhook_idle_timeout_secs,
            stats_window_minutes,
            async_job_timeout_secs,
            log_level,
        })
    }
}
