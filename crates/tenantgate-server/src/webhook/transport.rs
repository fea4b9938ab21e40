//! Outbound delivery of webhook payloads.

use super::types::WebhookPayload;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Header carrying the event name on every delivery.
pub const EVENT_HEADER: &str = "X-Webhook-Event";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("endpoint responded with status {0}")]
    Status(u16),
}

/// Sends one payload to one endpoint.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn deliver(&self, url: &Url, payload: &WebhookPayload) -> Result<(), WebhookError>;
}

/// JSON-over-HTTP transport.
#[derive(Clone)]
pub struct HttpWebhookTransport {
    client: reqwest::Client,
}

impl HttpWebhookTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(&self, url: &Url, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url.clone())
            .header(EVENT_HEADER, payload.event.as_str())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WebhookError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpWebhookTransport {
        HttpWebhookTransport::new(Duration::from_secs(2), "tenantgate-test").unwrap()
    }

    #[tokio::test]
    async fn test_posts_json_with_event_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/sales"))
            .and(header(EVENT_HEADER, "sale.created"))
            .and(body_partial_json(json!({"event": "sale.created", "data": {"id": 7}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/hooks/sales", server.uri())).unwrap();
        let payload = WebhookPayload::new("sale.created", json!({"id": 7}));

        transport().deliver(&url, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = transport()
            .deliver(&url, &WebhookPayload::new("sale.created", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::Status(500)));
    }
}
