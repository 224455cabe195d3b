use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::job::JobStatus;

/// Per-request timeout for one delivery attempt.
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Payload POSTed to the caller's webhook URL on a terminal job outcome.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook endpoint returned status {0}")]
    Status(u16),
}

/// Reliable terminal-notification delivery with exponential backoff.
///
/// One `deliver` call is one delivery cycle: up to `max_attempts` HTTP
/// attempts, the first immediate, each later one preceded by a 2s, 4s, 8s,
/// 16s, ... wait. Both non-2xx responses and transport errors are retried.
/// Exhaustion is logged and reported as `false`; it never affects the job.
pub struct WebhookNotifier {
    http: Client,
    max_attempts: u32,
}

/// Wait before the given 1-based attempt: zero for the first, then
/// doubling from 2 seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    if attempt <= 1 {
        Duration::ZERO
    } else {
        Duration::from_secs(1 << (attempt - 1))
    }
}

impl WebhookNotifier {
    pub fn new(max_attempts: u32) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .expect("Failed to create webhook HTTP client");

        Self { http, max_attempts }
    }

    /// Run one delivery cycle. Returns whether any attempt got a 2xx back.
    pub async fn deliver(&self, url: &str, payload: &WebhookPayload) -> bool {
        for attempt in 1..=self.max_attempts.max(1) {
            let delay = backoff_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.post_once(url, payload).await {
                Ok(status_code) => {
                    info!(
                        job_id = %payload.job_id,
                        url = %url,
                        attempt = attempt,
                        status_code = status_code,
                        "Webhook delivered"
                    );
                    return true;
                }
                Err(e) => {
                    warn!(
                        job_id = %payload.job_id,
                        url = %url,
                        attempt = attempt,
                        error = %e,
                        "Webhook delivery attempt failed"
                    );
                }
            }
        }

        metrics::counter!("webhook_deliveries_abandoned").increment(1);
        tracing::error!(
            job_id = %payload.job_id,
            url = %url,
            attempts = self.max_attempts,
            "Webhook delivery abandoned after exhausting retries"
        );
        false
    }

    async fn post_once(&self, url: &str, payload: &WebhookPayload) -> Result<u16, WebhookError> {
        let response = self.http.post(url).json(payload).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(WebhookError::Status(status.as_u16()))
        }
    }
}
