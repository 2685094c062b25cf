use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::PushError;
use crate::models::*;

pub const DEFAULT_GATEWAY_URL: &str = "https://exp.host/--/api/v2/push/send";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Push gateway settings
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub endpoint: String,
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GATEWAY_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Batched Push Sender
///
/// Sends store-and-forward notifications to the push gateway. Each call is
/// best-effort: batches are attempted once, in input order, and a failed batch
/// never stops the remaining ones.
#[derive(Clone)]
pub struct PushBatchSender {
    config: PushConfig,
    http_client: reqwest::Client,
}

impl PushBatchSender {
    pub fn new(config: PushConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_client(config: PushConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Send one notification per token, batched
    ///
    /// Never fails: the returned report lists the outcome of every batch.
    /// An empty token list returns an empty report without any outbound call.
    pub async fn send_batched_push(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> PushReport {
        if tokens.is_empty() {
            debug!("No push tokens supplied, skipping push send");
            return PushReport::default();
        }

        let messages: Vec<PushMessage> = tokens
            .iter()
            .map(|token| PushMessage::new(token.as_str(), title, body, data.clone()))
            .collect();

        let batches = partition(&messages, self.config.batch_size);
        let total = batches.len();
        let mut report = PushReport {
            batches: Vec::with_capacity(total),
        };

        for (index, batch) in batches.into_iter().enumerate() {
            let outcome = match self.send_batch(batch).await {
                Ok(()) => {
                    debug!(batch = index, size = batch.len(), "Push batch delivered");
                    BatchOutcome::Delivered {
                        index,
                        size: batch.len(),
                    }
                }
                Err(e) => {
                    warn!(
                        batch = index,
                        size = batch.len(),
                        error = %e,
                        "Push batch failed, skipping"
                    );
                    BatchOutcome::Failed {
                        index,
                        size: batch.len(),
                        error: e.to_string(),
                    }
                }
            };
            report.batches.push(outcome);
        }

        info!(
            tokens = tokens.len(),
            batches = total,
            failed = report.failed_batches(),
            "Batched push send complete"
        );

        report
    }

    /// POST a single batch to the gateway
    async fn send_batch(&self, batch: &[PushMessage]) -> Result<(), PushError> {
        let payload = serde_json::to_vec(batch).map_err(|e| PushError::Encode(e.to_string()))?;

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .timeout(self.config.timeout)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PushError::Timeout(self.config.timeout)
                } else {
                    PushError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            reqwest::StatusCode::OK => Ok(()),
            status => Err(PushError::Status(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PushConfig::default();
        assert_eq!(config.endpoint, DEFAULT_GATEWAY_URL);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_empty_tokens_makes_no_request() {
        // Unroutable endpoint: any request attempt would be reported as a failed batch
        let sender = PushBatchSender::new(PushConfig {
            endpoint: "http://127.0.0.1:9/push".to_string(),
            ..PushConfig::default()
        });

        let report = sender
            .send_batched_push(&[], "title", "body", serde_json::Value::Null)
            .await;

        assert_eq!(report.batch_count(), 0);
        assert!(report.all_delivered());
    }
}
