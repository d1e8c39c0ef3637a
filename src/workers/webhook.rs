//! Outbound webhook delivery. The only correctness lever here is the split
//! between permanent failures (malformed payload, never retried) and
//! retriable ones (network errors, non-2xx responses).

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::TaskError;
use crate::models::location::WebhookPayload;

pub struct WebhookDispatcher {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(webhook_url: String, client: reqwest::Client) -> Self {
        Self {
            webhook_url,
            client,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.webhook_request_timeout_secs))
            .pool_max_idle_per_host(config.webhook_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.webhook_idle_timeout_secs))
            .build()?;
        Ok(Self::new(config.webhook_url.clone(), client))
    }

    /// Delivers one task payload. A payload that does not decode is a
    /// permanent failure and no HTTP call is attempted.
    pub async fn process(&self, payload: serde_json::Value) -> Result<(), TaskError> {
        let payload: WebhookPayload = serde_json::from_value(payload)
            .map_err(|err| TaskError::Permanent(format!("malformed webhook payload: {err}")))?;

        debug!(user_id = %payload.user_id, "delivering webhook");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                warn!(user_id = %payload.user_id, "webhook request failed: {err}");
                TaskError::Retriable(format!("webhook request failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(user_id = %payload.user_id, "webhook returned status {status}");
            return Err(TaskError::Retriable(format!(
                "webhook returned status {status}"
            )));
        }

        debug!(user_id = %payload.user_id, "webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one canned HTTP response on an ephemeral port and
    /// returns the URL to hit.
    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn payload() -> serde_json::Value {
        json!({"user_id": "u1", "latitude": 55.7558, "longitude": 37.6173})
    }

    #[tokio::test]
    async fn test_malformed_payload_is_permanent_without_http_call() {
        // Nothing listens on this URL; a permanent failure must be reported
        // before any connection attempt.
        let dispatcher =
            WebhookDispatcher::new("http://127.0.0.1:1".to_string(), reqwest::Client::new());

        let res = dispatcher.process(json!("not an object")).await;
        assert!(matches!(res, Err(TaskError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_success_status_is_ok() {
        let url = serve_once("200 OK").await;
        let dispatcher = WebhookDispatcher::new(url, reqwest::Client::new());

        let res = dispatcher.process(payload()).await;
        assert!(res.is_ok(), "unexpected outcome: {:?}", res);
    }

    #[tokio::test]
    async fn test_server_error_is_retriable() {
        let url = serve_once("500 Internal Server Error").await;
        let dispatcher = WebhookDispatcher::new(url, reqwest::Client::new());

        let res = dispatcher.process(payload()).await;
        assert!(matches!(res, Err(TaskError::Retriable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retriable() {
        let dispatcher =
            WebhookDispatcher::new("http://127.0.0.1:1".to_string(), reqwest::Client::new());

        let res = dispatcher.process(payload()).await;
        assert!(matches!(res, Err(TaskError::Retriable(_))));
    }
}
