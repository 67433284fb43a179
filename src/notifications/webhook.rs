use crate::error::{AppError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// JSON-over-HTTP webhook transport; one call is one attempt
#[derive(Clone)]
pub struct WebhookSender {
    pub(crate) client: Client,
    pub(crate) timeout_secs: u64,
    user_agent: String,
}

impl WebhookSender {
    /// Create a new webhook sender with a per-request timeout
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs,
            user_agent: format!("customer-retention-service/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// POST `payload` once; returns the response body parsed as JSON when it is JSON
    pub async fn send_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
        request_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Option<serde_json::Value>> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", self.user_agent.as_str())
            .header("X-Request-ID", request_id);

        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.json(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Internal(format!(
                    "Webhook request timed out after {} seconds",
                    self.timeout_secs
                ))
            } else if e.is_connect() {
                AppError::Internal(format!("Failed to connect to webhook URL: {}", e))
            } else {
                AppError::Internal(format!("Webhook request failed: {}", e))
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| String::new());

        // Check for success status codes (2xx)
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "Webhook returned non-success status {}: {}",
                status,
                if body.is_empty() {
                    "No response body"
                } else {
                    &body
                }
            )));
        }

        debug!(url = %url, status = status.as_u16(), "Webhook accepted");
        Ok(serde_json::from_str(&body).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_sender_creation() {
        let sender = WebhookSender::new(10).unwrap();
        assert!(sender
            .user_agent()
            .starts_with("customer-retention-service/"));
    }

    #[tokio::test]
    async fn test_send_json_success_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("x-request-id", "req-1")
            .match_header("x-api-key", "secret")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"accepted":true}"#)
            .create_async()
            .await;

        let sender = WebhookSender::new(5).unwrap();
        let headers = HashMap::from([("X-Api-Key".to_string(), "secret".to_string())]);
        let body = sender
            .send_json(
                &format!("{}/hook", server.url()),
                &json!({"event": "test"}),
                "req-1",
                &headers,
            )
            .await
            .unwrap();

        assert_eq!(body, Some(json!({"accepted": true})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(503)
            .create_async()
            .await;

        let sender = WebhookSender::new(5).unwrap();
        let err = sender
            .send_json(
                &format!("{}/hook", server.url()),
                &json!({}),
                "req-2",
                &HashMap::new(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("503"));
    }
}
