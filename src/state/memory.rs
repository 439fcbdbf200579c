use std::collections::HashSet;

use crate::error::StoreError;
use crate::models::CanonicalTransferRecord;
use crate::state::StateStore;

/// Volatile dedup set; empty on every start
#[derive(Debug, Default)]
pub struct InMemoryStore {
    processed: HashSet<String>,
    cursor: Option<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.processed.contains(transaction_id)
    }
}

impl StateStore for InMemoryStore {
    fn is_processed(&self, transaction_id: &str) -> Result<bool, StoreError> {
        Ok(self.processed.contains(transaction_id))
    }

    fn mark_processed(&mut self, record: &CanonicalTransferRecord) -> Result<(), StoreError> {
        self.processed.insert(record.transaction_id.clone());
        Ok(())
    }

    // The cursor is kept for the running process only; a fresh store always
    // reports none so startup falls back to the head offset.
    fn load_cursor(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.cursor)
    }

    fn save_cursor(&mut self, next_from_block: u64) -> Result<(), StoreError> {
        self.cursor = Some(next_from_block);
        Ok(())
    }

    fn processed_count(&self) -> Result<u64, StoreError> {
        Ok(self.processed.len() as u64)
    }
}
