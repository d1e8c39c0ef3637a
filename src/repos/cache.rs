//! Redis-backed active-incident cache: one well-known key holding the
//! JSON-encoded active set, bounded by a TTL and invalidated eagerly on
//! every incident mutation.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::errors::CacheError;
use crate::models::incident::IncidentShort;
use crate::services::incident::ActiveSetInvalidator;
use crate::services::location::ActiveIncidentCache;

pub const KEY_ACTIVE_INCIDENTS: &str = "incidents:active";

pub async fn connect(redis_url: &str) -> redis::RedisResult<MultiplexedConnection> {
    let client = redis::Client::open(redis_url)?;
    client.get_multiplexed_async_connection().await
}

#[derive(Clone)]
pub struct CacheRepo {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl CacheRepo {
    pub fn new(conn: MultiplexedConnection, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }
}

#[async_trait]
impl ActiveIncidentCache for CacheRepo {
    async fn get_active_incidents(&self) -> Result<Vec<IncidentShort>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(KEY_ACTIVE_INCIDENTS).await?;
        match raw {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(CacheError::Miss),
        }
    }

    async fn set_active_incidents(&self, incidents: &[IncidentShort]) -> Result<(), CacheError> {
        let data = serde_json::to_vec(incidents)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(KEY_ACTIVE_INCIDENTS, data, self.ttl_secs).await?;
        Ok(())
    }
}

#[async_trait]
impl ActiveSetInvalidator for CacheRepo {
    async fn invalidate_active_incidents(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(KEY_ACTIVE_INCIDENTS).await?;
        Ok(())
    }
}
