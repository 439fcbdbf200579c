pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod models;
pub mod relay;
pub mod retry;
pub mod state;

pub use blockchain::{ContractBinding, EventNormalizer, EventSchema, EventSource, RpcClient};
pub use config::{AppConfig, ApiConfig, ChainConfig, ListenerConfig, LoggingConfig, RelayFailurePolicy, RelayerConfig, StateBackend, StateConfig};
pub use error::{RelayerError, Result};
pub use listener::{BridgeListener, CycleReport, ListenerSettings, ListenerState, ListenerStatus, Shutdown};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use relay::{Relay, RelayClient, RelayOutcome};
pub use retry::{RetryConfig, RetryManager, RetryOutcome};
pub use state::{InMemoryStore, SqliteStore, StateStore};
