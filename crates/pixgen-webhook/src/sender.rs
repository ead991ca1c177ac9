//! Webhook delivery with fixed retry
//!
//! Results are reported to the backend with a bounded number of
//! attempts and a fixed delay between them. Delivery failure is
//! surfaced to the caller as an error, but callers log it rather than
//! folding it into task status.

use pixgen_core::{PixgenError, PixgenResult, WebhookConfig};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::sign::{sign, SIGNATURE_HEADER};

/// Signed webhook sender
pub struct WebhookSender {
    client: reqwest::Client,
    secret: Vec<u8>,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookSender {
    /// Create a sender with the given delivery settings
    pub fn new(config: &WebhookConfig, secret: impl Into<Vec<u8>>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            secret: secret.into(),
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_secs(config.backoff_secs),
        }
    }

    /// Serialize, sign, and deliver a payload to `url`
    pub async fn send<T: Serialize>(&self, url: &str, payload: &T) -> PixgenResult<()> {
        let body = serde_json::to_vec(payload)?;
        let signature = sign(&self.secret, &body);

        for attempt in 1..=self.max_attempts {
            let result = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(SIGNATURE_HEADER, &signature)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(url, attempt, "Webhook delivered");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(
                        url,
                        attempt,
                        status = %response.status(),
                        "Webhook rejected"
                    );
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "Webhook delivery error");
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(PixgenError::Webhook(format!(
            "Delivery to {} failed after {} attempts",
            url, self.max_attempts
        )))
    }
}
