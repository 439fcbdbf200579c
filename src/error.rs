use thiserror::Error;

/// Main error type for the bridge event relayer
#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Contract binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

/// Chain RPC errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Dedup / cursor store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),
}

/// Errors raised while turning a raw log into a canonical transfer record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("Event signature mismatch: expected={expected}, got={got}")]
    EventSignature { expected: String, got: String },

    #[error("Missing topic at index {index}")]
    MissingTopic { index: usize },

    #[error("Unexpected topic count: expected {expected}, got {got}")]
    TopicCount { expected: usize, got: usize },

    #[error("Insufficient log data: expected {expected} bytes, got {got}")]
    InsufficientData { expected: usize, got: usize },

    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Schema has no field named {0}")]
    MissingField(String),

    #[error("Field {field} has type {actual}, expected {expected}")]
    FieldType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Value overflow: {0}")]
    Overflow(String),

    #[error("Log was removed by a chain reorganisation")]
    RemovedLog,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    MissingValue(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Contract binding errors, fatal at startup
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Not connected to the chain node at {0}")]
    NotConnected(String),

    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),
}

/// A single failed relay attempt
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Relayer responded with HTTP {status}")]
    Status { status: u16 },

    #[error("Relay request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Relay transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RelayerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The process cannot continue
    Critical,
    /// A cycle or delivery was lost
    High,
    /// Transient, handled by backoff
    Medium,
    /// Mostly informational
    Low,
}

impl RelayerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RelayerError::Config(_) => ErrorSeverity::Critical,
            RelayerError::Binding(_) => ErrorSeverity::Critical,

            RelayerError::Relay(_) => ErrorSeverity::High,
            RelayerError::Store(_) => ErrorSeverity::High,
            RelayerError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,

            RelayerError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            RelayerError::Rpc(_) => ErrorSeverity::Medium,

            RelayerError::Normalization(_) => ErrorSeverity::Low,
        }
    }

    /// Check if the listener loop can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            RelayerError::Rpc(_) => true,
            RelayerError::Store(StoreError::Lock(_)) => true,
            RelayerError::Store(StoreError::Sqlite(_)) => true,
            RelayerError::Normalization(_) => true,
            RelayerError::Relay(_) => true,

            RelayerError::Config(_) => false,
            RelayerError::Binding(_) => false,
            RelayerError::Store(StoreError::Corrupt(_)) => false,
        }
    }
}
