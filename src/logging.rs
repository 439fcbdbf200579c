use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, RelayerError};

/// Structured logging context for the relayer
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_block_range(self, from: u64, to: u64) -> Self {
        self.with_metadata("from_block", json!(from))
            .with_metadata("to_block", json!(to))
    }

    pub fn with_transaction_id(self, transaction_id: &str) -> Self {
        self.with_metadata("transaction_id", json!(transaction_id))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_attempt(self, attempt: u32, max_attempts: u32) -> Self {
        self.with_metadata("attempt", json!(attempt))
            .with_metadata("max_attempts", json!(max_attempts))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times a single operation and logs the outcome at debug level
pub struct PerformanceMonitor {
    start: Instant,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => context.trace(&format!("Operation completed in {}ms", duration)),
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.debug(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &RelayerError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_relay_attempt_failed(transaction_id: &str, attempt: u32, max_attempts: u32, error: &str) {
        let context = LogContext::new("relay", "attempt_failed")
            .with_transaction_id(transaction_id)
            .with_attempt(attempt, max_attempts)
            .with_metadata("error", json!(error));

        if attempt >= max_attempts {
            context.error(&format!(
                "Failed to relay TxID {} after {} attempts: {}",
                transaction_id, max_attempts, error
            ));
        } else {
            context.warn(&format!(
                "Attempt {}/{} failed to relay TxID {}: {}",
                attempt, max_attempts, transaction_id, error
            ));
        }
    }
}

/// Per-cycle and per-call metric lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_relay(transaction_id: &str, attempts: u32, success: bool, duration_ms: u64) {
        let context = LogContext::new("metrics", "relay")
            .with_transaction_id(transaction_id)
            .with_metadata("attempts", json!(attempts))
            .with_metadata("success", json!(success))
            .with_duration_ms(duration_ms);

        if success {
            context.info(&format!("Relayed TxID {} in {} attempt(s)", transaction_id, attempts));
        } else {
            context.warn(&format!("Gave up on TxID {} after {} attempt(s)", transaction_id, attempts));
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_cycle(
        from_block: u64,
        to_block: u64,
        events: usize,
        relayed: u32,
        skipped: u32,
        failed: u32,
        invalid: u32,
        duration_ms: u64,
    ) {
        let context = LogContext::new("metrics", "scan_cycle")
            .with_block_range(from_block, to_block)
            .with_metadata("events", json!(events))
            .with_metadata("relayed", json!(relayed))
            .with_metadata("skipped", json!(skipped))
            .with_metadata("failed", json!(failed))
            .with_metadata("invalid", json!(invalid))
            .with_duration_ms(duration_ms);

        if failed > 0 || invalid > 0 {
            context.warn(&format!(
                "Scanned blocks {}-{}: {} event(s), {} relayed, {} failed, {} invalid",
                from_block, to_block, events, relayed, failed, invalid
            ));
        } else {
            context.info(&format!(
                "Scanned blocks {}-{}: {} event(s), {} relayed, {} skipped",
                from_block, to_block, events, relayed, skipped
            ));
        }
    }
}

/// Initialize structured logging for the application
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = config.format == "json";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format(move |buf, record| {
            use std::io::Write;

            let line = record.args().to_string();
            if let Ok(json_value) = serde_json::from_str::<Value>(&line) {
                if json_output {
                    writeln!(buf, "{}", json_value)
                } else {
                    writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?)
                }
            } else if json_output {
                let entry = json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "message": line,
                });
                writeln!(buf, "{}", entry)
            } else {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    line
                )
            }
        })
        .try_init()?;

    info!("Structured logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_context_with_metadata() {
        let context = LogContext::new("listener", "scan")
            .with_block_range(100, 200)
            .with_transaction_id("0xaa")
            .with_attempt(2, 3);

        assert_eq!(context.metadata.get("from_block"), Some(&json!(100)));
        assert_eq!(context.metadata.get("to_block"), Some(&json!(200)));
        assert_eq!(context.metadata.get("transaction_id"), Some(&json!("0xaa")));
        assert_eq!(context.metadata.get("attempt"), Some(&json!(2)));
        assert_eq!(context.metadata.get("max_attempts"), Some(&json!(3)));
    }

    #[test]
    fn test_log_context_format_message() {
        let context = LogContext::new("relay", "post").with_metadata("key", json!("value"));

        let message = context.format_message("INFO", "test message");

        let parsed: Value = serde_json::from_str(&message).expect("Should be valid JSON");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["component"], "relay");
        assert_eq!(parsed["operation"], "post");
        assert_eq!(parsed["message"], "test message");
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn test_performance_monitor_reports_duration() {
        let monitor = PerformanceMonitor::new("rpc_eth_blockNumber").with_metadata("endpoint", json!("http://node"));
        let result: Result<(), String> = Err("connection refused".to_string());
        let duration = monitor.finish_with_result(&result);
        assert!(duration < 1_000);
    }

    #[test]
    fn test_logging_helpers_do_not_panic() {
        let error = RelayerError::Config(crate::error::ConfigError::MissingValue("SOURCE_CHAIN_RPC_URL".to_string()));
        ErrorLogger::log_error(&error, Some(LogContext::new("test", "error_test")));
        ErrorLogger::log_relay_attempt_failed("0xaa", 1, 3, "HTTP 500");
        ErrorLogger::log_relay_attempt_failed("0xaa", 3, 3, "HTTP 500");
        MetricsLogger::log_rpc_call("eth_getLogs", 25, true);
        MetricsLogger::log_relay("0xaa", 2, true, 1_050);
        MetricsLogger::log_cycle(100, 110, 3, 2, 1, 0, 0, 40);
    }
}
