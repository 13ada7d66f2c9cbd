//! Webhook sink.
//!
//! Posts action requests as JSON to an HTTP endpoint. Response codes are
//! mapped onto the dispatcher's failure classes: throttling and server
//! errors are worth retrying, other client errors are not.

use crate::sink::{ActionRequest, ActionSink, SinkResponse};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Sink that delivers actions to an HTTP endpoint.
pub struct WebhookSink {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Creates a webhook sink posting to `url`.
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ActionSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, request: &ActionRequest) -> SinkResponse {
        let response = match self.client.post(&self.url).json(request).send().await {
            Ok(response) => response,
            Err(err) => {
                // Timeouts and connection resets may clear up on retry.
                return SinkResponse::TransientFailure {
                    reason: format!("request failed: {err}"),
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            let detail = response.text().await.ok().filter(|body| !body.is_empty());
            return SinkResponse::Ack { detail };
        }
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            return SinkResponse::TransientFailure {
                reason: format!("endpoint returned {status}"),
            };
        }
        SinkResponse::PermanentFailure {
            reason: format!("endpoint returned {status}"),
        }
    }
}
