//! Task consumer: a Kafka consumer loop with a circuit breaker, draining
//! webhook tasks into a semaphore-bounded worker pool.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::errors::TaskError;
use crate::queue::{TaskEnvelope, TASK_DANGER_WEBHOOK};
use crate::workers::webhook::WebhookDispatcher;

/// Runs the queue consumer until the process stops. Each received task is
/// processed on its own tokio task; the semaphore caps how many run at once.
pub async fn run_consumer(
    config: &AppConfig,
    dispatcher: Arc<WebhookDispatcher>,
) -> anyhow::Result<()> {
    info!(
        "initializing queue consumer for topic: {}",
        config.kafka_topic
    );

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        // Offsets are stored by hand once a task settles; the auto-commit
        // thread then only ever commits finished work, so a crash with tasks
        // in flight re-delivers them instead of dropping them.
        .set("enable.auto.commit", "true")
        .set("enable.auto.offset.store", "false")
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);

    let consumer: Arc<StreamConsumer> = Arc::new(client_config.create()?);

    consumer.subscribe(&[&config.kafka_topic])?;
    info!("subscribed to topic: {}", config.kafka_topic);

    let semaphore = Arc::new(Semaphore::new(config.queue_concurrency));
    let mut consecutive_failures = 0;
    let max_failures = config.kafka_max_retries;
    let cooldown = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        if consecutive_failures >= max_failures {
            warn!(
                "circuit breaker tripped ({} consecutive failures), sleeping for {}s",
                consecutive_failures, config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown).await;
            consecutive_failures = 0;
            info!("circuit breaker reset, resuming consumption");
        }

        match consumer.recv().await {
            Ok(message) => {
                consecutive_failures = 0;

                let payload = match message.payload() {
                    None => {
                        // Skipped messages still advance the offset.
                        warn!("received task with empty payload, skipping");
                        if let Err(err) = consumer.store_offset(
                            message.topic(),
                            message.partition(),
                            message.offset(),
                        ) {
                            error!("failed to store offset for skipped task: {err}");
                        }
                        continue;
                    }
                    Some(p) => p.to_vec(),
                };

                let topic = message.topic().to_string();
                let partition = message.partition();
                let offset = message.offset();

                let permit = Arc::clone(&semaphore).acquire_owned().await?;
                let dispatcher = Arc::clone(&dispatcher);
                let consumer = Arc::clone(&consumer);
                tokio::spawn(async move {
                    let _permit = permit;
                    settle_task(&dispatcher, &payload, move || {
                        if let Err(err) = consumer.store_offset(&topic, partition, offset) {
                            error!(
                                "failed to store offset {offset} for {topic}/{partition}: {err}"
                            );
                        }
                    })
                    .await;
                });
            }
            Err(err) => {
                consecutive_failures += 1;
                error!(
                    "queue consumer error: {} ({} / {})",
                    err, consecutive_failures, max_failures
                );
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}

/// Runs one task and then acknowledges it. The acknowledgement runs strictly
/// after the task settles (delivered, abandoned, or dropped), never before:
/// a process that dies mid-task leaves the offset unstored and the broker
/// re-delivers the task to the next consumer.
async fn settle_task(dispatcher: &WebhookDispatcher, raw: &[u8], ack: impl FnOnce()) {
    process_task(dispatcher, raw).await;
    ack();
}

/// Runs one task to completion: per-attempt execution timeout from the
/// envelope, bounded retries with backoff for retriable failures, immediate
/// abandonment for permanent ones.
async fn process_task(dispatcher: &WebhookDispatcher, raw: &[u8]) {
    let envelope: TaskEnvelope = match serde_json::from_slice(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            error!("dropping malformed task envelope: {err}");
            return;
        }
    };

    if envelope.task_type != TASK_DANGER_WEBHOOK {
        warn!("dropping task of unknown type: {}", envelope.task_type);
        return;
    }

    let attempt_timeout = Duration::from_secs(envelope.timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        let work = dispatcher.process(envelope.payload.clone());
        let outcome = match tokio::time::timeout(attempt_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Retriable(format!(
                "task execution timed out after {}s",
                envelope.timeout_secs
            ))),
        };

        match outcome {
            Ok(()) => return,
            Err(TaskError::Permanent(err)) => {
                error!("abandoning task, permanent failure: {err}");
                return;
            }
            Err(TaskError::Retriable(err)) => {
                if attempt >= envelope.max_retries {
                    error!(
                        "abandoning task after {} retries: {err}",
                        envelope.max_retries
                    );
                    return;
                }
                attempt += 1;
                let delay = retry_backoff(attempt);
                warn!(
                    "task failed (attempt {} / {}), retrying in {:?}: {err}",
                    attempt, envelope.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Capped exponential backoff: 2s, 4s, 8s, ... up to 64s.
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}
