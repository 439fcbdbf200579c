use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::logging::{LogContext, PerformanceMonitor};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Policy used for relayer deliveries: `attempts` tries, 1s then 2s then 4s...
    pub fn for_relay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based): `initial * multiplier^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Result of running an operation under a retry policy
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

/// Bounded retry with exponential backoff and no jitter
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The closure receives the 1-based attempt number. There is no sleep
    /// after the final attempt.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let monitor = PerformanceMonitor::new(&format!("{}_attempt_{}", self.operation_name, attempt));
            let result = operation(attempt).await;
            monitor.finish_with_result(&result);

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        LogContext::new("retry", &self.operation_name)
                            .with_attempt(attempt, max_attempts)
                            .info(&format!("Succeeded on attempt {} of {}", attempt, max_attempts));
                    }
                    return RetryOutcome::Succeeded { value, attempts: attempt };
                }
                Err(error) => {
                    if attempt >= max_attempts {
                        LogContext::new("retry", &self.operation_name)
                            .with_attempt(attempt, max_attempts)
                            .with_metadata("error", serde_json::json!(error.to_string()))
                            .debug("Retry budget exhausted");
                        return RetryOutcome::Exhausted {
                            last_error: error,
                            attempts: attempt,
                        };
                    }

                    let delay = self.config.delay_for(attempt);
                    LogContext::new("retry", &self.operation_name)
                        .with_attempt(attempt, max_attempts)
                        .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64))
                        .with_metadata("error", serde_json::json!(error.to_string()))
                        .debug(&format!("Retrying in {}ms", delay.as_millis()));

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
