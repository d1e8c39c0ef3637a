use thiserror::Error;

/// Errors from the incident store and the audit log.
#[derive(Debug, Error)]
pub enum IncidentError {
    /// Another incident (active or not) lies within the minimum separation
    /// distance of the requested center.
    #[error("incident already exists")]
    Exists,

    #[error("incident not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors from the active-incident cache. `Miss` is a control-flow signal,
/// not a failure: callers fall back to the store and repopulate.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache entry codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors from the notification queue producer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to serialize task payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to enqueue task: {0}")]
    Broker(String),
}

/// Consumer-side task outcome classification. Only `Retriable` failures are
/// returned to the retry loop; `Permanent` ones are dropped immediately
/// because retrying cannot fix them.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("permanent task failure: {0}")]
    Permanent(String),

    #[error("retriable task failure: {0}")]
    Retriable(String),
}
