use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::json;

use crate::config::RelayerConfig;
use crate::error::RelayError;
use crate::logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{CanonicalTransferRecord, RelayPayload};
use crate::relay::{Relay, RelayOutcome};
use crate::retry::{RetryConfig, RetryManager, RetryOutcome};

/// HTTP client posting transfer records to the relayer endpoint
pub struct RelayClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    retry: RetryManager,
}

impl RelayClient {
    pub fn new(config: &RelayerConfig) -> Result<Self, RelayError> {
        let retry = RetryConfig {
            initial_delay_ms: config.initial_backoff_ms,
            ..RetryConfig::for_relay(config.max_attempts)
        };
        Self::with_retry_config(&config.endpoint, config.timeout_seconds, &config.user_agent, retry)
    }

    pub fn with_retry_config(
        endpoint: &str,
        timeout_seconds: u64,
        user_agent: &str,
        retry: RetryConfig,
    ) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(user_agent.to_string())
            .default_headers(headers)
            .build()?;

        LogContext::new("relay_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds))
            .with_metadata("max_attempts", json!(retry.max_attempts))
            .info("Initializing relay client");

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout_seconds,
            retry: RetryManager::new("relay", retry),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One POST; any non-2xx status is an error
    async fn post_once(&self, payload: &RelayPayload) -> Result<u16, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout {
                        seconds: self.timeout_seconds,
                    }
                } else {
                    RelayError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status {
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }
}

#[async_trait]
impl Relay for RelayClient {
    async fn relay(&self, record: &CanonicalTransferRecord) -> RelayOutcome {
        let payload = RelayPayload::from(record);
        let max_attempts = self.retry.config().max_attempts;
        let monitor = PerformanceMonitor::new("relay_transfer");

        LogContext::new("relay_client", "relay")
            .with_transaction_id(&record.transaction_id)
            .with_metadata("destination_chain_id", json!(record.destination_chain_id))
            .with_metadata("amount", json!(record.amount))
            .debug(&format!("Relaying TxID {} to {}", record.transaction_id, self.endpoint));

        let outcome = self
            .retry
            .execute(|attempt| {
                let payload = &payload;
                async move {
                    let result = self.post_once(payload).await;
                    if let Err(e) = &result {
                        ErrorLogger::log_relay_attempt_failed(&payload.source_transaction_id, attempt, max_attempts, &e.to_string());
                    }
                    result
                }
            })
            .await;

        let duration = monitor.elapsed_ms();
        let outcome = match outcome {
            RetryOutcome::Succeeded { value, attempts } => RelayOutcome::Delivered {
                attempts,
                status: value,
            },
            RetryOutcome::Exhausted { last_error, attempts } => RelayOutcome::Failed {
                attempts,
                last_error: last_error.to_string(),
            },
        };

        MetricsLogger::log_relay(&record.transaction_id, outcome.attempts(), outcome.is_delivered(), duration);
        outcome
    }
}
