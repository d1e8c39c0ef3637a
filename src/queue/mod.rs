//! Durable notification queue over Kafka. Producers attach the retry budget
//! and per-attempt execution timeout to each task; the consumer drains the
//! topic with a bounded worker pool and hands payloads to the webhook
//! dispatcher.

use serde::{Deserialize, Serialize};

pub mod consumer;
pub mod producer;

pub use consumer::run_consumer;
pub use producer::QueueProducer;

pub const TASK_DANGER_WEBHOOK: &str = "webhook:danger";

/// Wire format of one queued task. `payload` stays an opaque JSON value
/// here; decoding it is the task handler's job, so a malformed payload can
/// be classified as a permanent failure instead of poisoning the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_type: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub payload: serde_json::Value,
}
