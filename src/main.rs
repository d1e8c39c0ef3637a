use std::sync::Arc;

use geo_alerts::config::AppConfig;
use geo_alerts::queue;
use geo_alerts::workers::webhook::WebhookDispatcher;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("starting geo-alerts webhook delivery worker...");

    let dispatcher = Arc::new(WebhookDispatcher::from_config(&config)?);
    info!("webhook dispatcher ready, target: {}", config.webhook_url);

    // Drain the notification queue until the process is stopped
    queue::run_consumer(&config, dispatcher).await?;

    Ok(())
}
