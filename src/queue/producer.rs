use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::QueueError;
use crate::models::location::WebhookPayload;
use crate::queue::{TaskEnvelope, TASK_DANGER_WEBHOOK};
use crate::services::location::AlertProducer;

const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct QueueProducer {
    producer: FutureProducer,
    topic: String,
    max_retries: u32,
    task_timeout_secs: u64,
}

impl QueueProducer {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .set("security.protocol", &config.kafka_security_protocol)
            .set("sasl.mechanism", &config.kafka_sasl_mechanism)
            .set("sasl.username", &config.kafka_username)
            .set("sasl.password", &config.kafka_password);

        let producer: FutureProducer = client_config.create()?;

        Ok(Self {
            producer,
            topic: config.kafka_topic.clone(),
            max_retries: config.queue_max_retries,
            task_timeout_secs: config.queue_task_timeout_secs,
        })
    }
}

#[async_trait]
impl AlertProducer for QueueProducer {
    /// Serializes the payload into a task envelope and submits it to the
    /// broker, waiting for the delivery acknowledgement. Once this returns
    /// `Ok` the task is owned by the broker and delivery is at-least-once.
    async fn enqueue_danger_alert(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), QueueError> {
        let envelope = TaskEnvelope {
            task_type: TASK_DANGER_WEBHOOK.to_string(),
            max_retries: self.max_retries,
            timeout_secs: self.task_timeout_secs,
            payload: serde_json::to_value(WebhookPayload {
                user_id: user_id.to_string(),
                latitude,
                longitude,
            })?,
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let record = FutureRecord::to(&self.topic).key(user_id).payload(&bytes);

        self.producer
            .send(record, ENQUEUE_TIMEOUT)
            .await
            .map_err(|(err, _)| QueueError::Broker(err.to_string()))?;

        Ok(())
    }
}
