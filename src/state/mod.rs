//! Idempotency set and block cursor persistence.
//!
//! The listener is the only writer. `memory` keeps everything in a `HashSet`
//! and forgets it on restart; `sqlite` survives restarts and also stores the
//! cursor so scanning resumes where it stopped.

pub mod memory;
pub mod schema;
pub mod sqlite;


use crate::config::{StateBackend, StateConfig};
use crate::error::StoreError;
use crate::models::CanonicalTransferRecord;

pub use memory::InMemoryStore;
pub use schema::initialize_schema;
pub use sqlite::{ProcessedTransferRow, SqliteStore};

pub trait StateStore: Send + Sync {
    fn is_processed(&self, transaction_id: &str) -> Result<bool, StoreError>;

    /// Record a successful relay. Marking the same id twice is a no-op.
    fn mark_processed(&mut self, record: &CanonicalTransferRecord) -> Result<(), StoreError>;

    /// Stored `next_from_block`, if any
    fn load_cursor(&self) -> Result<Option<u64>, StoreError>;

    fn save_cursor(&mut self, next_from_block: u64) -> Result<(), StoreError>;

    fn processed_count(&self) -> Result<u64, StoreError>;

    /// Whether the store keeps its contents across restarts
    fn is_durable(&self) -> bool {
        false
    }
}

impl StateStore for Box<dyn StateStore> {
    fn is_processed(&self, transaction_id: &str) -> Result<bool, StoreError> {
        (**self).is_processed(transaction_id)
    }

    fn mark_processed(&mut self, record: &CanonicalTransferRecord) -> Result<(), StoreError> {
        (**self).mark_processed(record)
    }

    fn load_cursor(&self) -> Result<Option<u64>, StoreError> {
        (**self).load_cursor()
    }

    fn save_cursor(&mut self, next_from_block: u64) -> Result<(), StoreError> {
        (**self).save_cursor(next_from_block)
    }

    fn processed_count(&self) -> Result<u64, StoreError> {
        (**self).processed_count()
    }

    fn is_durable(&self) -> bool {
        (**self).is_durable()
    }
}

/// Open the backend selected in configuration
pub fn open_store(config: &StateConfig) -> Result<Box<dyn StateStore>, StoreError> {
    match config.backend {
        StateBackend::Memory => Ok(Box::new(InMemoryStore::new())),
        StateBackend::Sqlite => Ok(Box::new(SqliteStore::new(&config.db_path)?)),
    }
}
