use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::blockchain::{validate_address, EventNormalizer, EventSchema};
use crate::error::ConfigError;

pub const DEFAULT_RELAYER_ENDPOINT: &str = "https://httpbin.org/post";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source chain connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Bridge contract emitting `TokensLocked`
    pub contract_address: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Replaces the built-in `TokensLocked` layout when set
    pub event_schema: Option<EventSchema>,
}

/// Downstream relayer service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub endpoint: String,
    /// Total attempts per event, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled after each failure
    pub initial_backoff_ms: u64,
    /// Per-attempt timeout in seconds
    pub timeout_seconds: u64,
    pub failure_policy: RelayFailurePolicy,
    pub user_agent: String,
}

/// Polling loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub poll_interval_seconds: u64,
    /// How far behind the head the first scan starts
    pub start_block_offset: u64,
    pub reconnect_delay_seconds: u64,
    pub error_backoff_seconds: u64,
    /// Requeue policy: queued records beyond this are dropped, oldest first
    pub max_pending: usize,
    /// Requeue policy: cycles a record is retried before it is dropped
    pub max_requeue_cycles: u32,
}

/// Dedup set and cursor persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub backend: StateBackend,
    /// SQLite file, used by the `sqlite` backend only
    pub db_path: String,
}

/// Status API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// What happens to an event whose relay exhausted its attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayFailurePolicy {
    /// Log and move on; the event is lost once the cursor passes it
    #[default]
    Drop,
    /// Keep it pending and retry at the start of the next scan cycle
    Requeue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Memory,
    Sqlite,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            contract_address: String::new(),
            timeout_seconds: 30,
            event_schema: None,
        }
    }
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RELAYER_ENDPOINT.to_string(),
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            timeout_seconds: 10,
            failure_policy: RelayFailurePolicy::Drop,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 15,
            start_block_offset: 100,
            reconnect_delay_seconds: 5,
            error_backoff_seconds: 60,
            max_pending: 100,
            max_requeue_cycles: 5,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Memory,
            db_path: "./relayer_state.db".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl fmt::Display for RelayFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayFailurePolicy::Drop => write!(f, "drop"),
            RelayFailurePolicy::Requeue => write!(f, "requeue"),
        }
    }
}

impl FromStr for RelayFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(RelayFailurePolicy::Drop),
            "requeue" => Ok(RelayFailurePolicy::Requeue),
            other => Err(format!("unknown relay failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for StateBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateBackend::Memory => write!(f, "memory"),
            StateBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StateBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StateBackend::Memory),
            "sqlite" => Ok(StateBackend::Sqlite),
            other => Err(format!("unknown state backend '{}'", other)),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the TOML file named by `CONFIG_FILE` (default `config.toml`).
    /// A missing file yields the defaults.
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Chain
        if let Ok(url) = env::var("SOURCE_CHAIN_RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Ok(address) = env::var("BRIDGE_CONTRACT_ADDRESS") {
            self.chain.contract_address = address;
        }
        if let Some(timeout) = parse_env("RPC_TIMEOUT_SECONDS")? {
            self.chain.timeout_seconds = timeout;
        }

        // Relayer
        if let Ok(endpoint) = env::var("RELAYER_API_ENDPOINT") {
            self.relayer.endpoint = endpoint;
        }
        if let Some(attempts) = parse_env("RELAY_MAX_ATTEMPTS")? {
            self.relayer.max_attempts = attempts;
        }
        if let Some(timeout) = parse_env("RELAY_TIMEOUT_SECONDS")? {
            self.relayer.timeout_seconds = timeout;
        }
        if let Some(policy) = parse_env("RELAY_FAILURE_POLICY")? {
            self.relayer.failure_policy = policy;
        }

        // Listener
        if let Some(interval) = parse_env("POLLING_INTERVAL_SECONDS")? {
            self.listener.poll_interval_seconds = interval;
        }
        if let Some(offset) = parse_env("START_BLOCK_OFFSET")? {
            self.listener.start_block_offset = offset;
        }
        if let Some(max_pending) = parse_env("REQUEUE_MAX_PENDING")? {
            self.listener.max_pending = max_pending;
        }
        if let Some(cycles) = parse_env("REQUEUE_MAX_CYCLES")? {
            self.listener.max_requeue_cycles = cycles;
        }

        // State
        if let Some(backend) = parse_env("STATE_BACKEND")? {
            self.state.backend = backend;
        }
        if let Ok(path) = env::var("STATE_DB_PATH") {
            self.state.db_path = path;
        }

        // API
        if let Some(enabled) = parse_env("API_ENABLED")? {
            self.api.enabled = enabled;
        }
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.api.port = port;
        }

        // Logging
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format.to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.rpc_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("SOURCE_CHAIN_RPC_URL".to_string()));
        }
        if !is_http_url(&self.chain.rpc_url) {
            return Err(ConfigError::InvalidUrl(self.chain.rpc_url.clone()));
        }

        if self.chain.contract_address.trim().is_empty() {
            return Err(ConfigError::MissingValue("BRIDGE_CONTRACT_ADDRESS".to_string()));
        }
        if validate_address(&self.chain.contract_address).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "chain.contract_address".to_string(),
                value: self.chain.contract_address.clone(),
            });
        }

        if self.chain.timeout_seconds == 0 || self.chain.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "chain.timeout_seconds".to_string(),
                value: self.chain.timeout_seconds.to_string(),
            });
        }

        if let Some(schema) = &self.chain.event_schema {
            EventNormalizer::new(schema.clone())
                .check_schema()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "chain.event_schema".to_string(),
                    value: e.to_string(),
                })?;
        }

        if !is_http_url(&self.relayer.endpoint) {
            return Err(ConfigError::InvalidUrl(self.relayer.endpoint.clone()));
        }

        if self.relayer.max_attempts == 0 || self.relayer.max_attempts > 20 {
            return Err(ConfigError::InvalidValue {
                key: "relayer.max_attempts".to_string(),
                value: self.relayer.max_attempts.to_string(),
            });
        }

        if self.relayer.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "relayer.timeout_seconds".to_string(),
                value: self.relayer.timeout_seconds.to_string(),
            });
        }

        if self.listener.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "listener.poll_interval_seconds".to_string(),
                value: self.listener.poll_interval_seconds.to_string(),
            });
        }

        if self.listener.max_pending == 0 {
            return Err(ConfigError::InvalidValue {
                key: "listener.max_pending".to_string(),
                value: self.listener.max_pending.to_string(),
            });
        }

        if self.listener.max_requeue_cycles == 0 {
            return Err(ConfigError::InvalidValue {
                key: "listener.max_requeue_cycles".to_string(),
                value: self.listener.max_requeue_cycles.to_string(),
            });
        }

        if self.state.backend == StateBackend::Sqlite && self.state.db_path.trim().is_empty() {
            return Err(ConfigError::MissingValue("STATE_DB_PATH".to_string()));
        }

        if self.api.enabled && self.api.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.port".to_string(),
                value: self.api.port.to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// The event layout the listener decodes
    pub fn event_schema(&self) -> EventSchema {
        self.chain
            .event_schema
            .clone()
            .unwrap_or_else(|| crate::blockchain::TOKENS_LOCKED.clone())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        let mut config = Self::default();
        config.chain.rpc_url = "http://127.0.0.1:8545".to_string();
        config.chain.contract_address = "0x0000000000000000000000000000000000000000".to_string();
        toml::to_string_pretty(&config).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
