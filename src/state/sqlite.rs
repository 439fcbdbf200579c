use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::models::CanonicalTransferRecord;
use crate::state::schema::initialize_schema;
use crate::state::StateStore;

/// Durable dedup set and cursor backed by SQLite
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// Represents a row from the processed_transfers table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedTransferRow {
    pub transaction_id: String,
    pub source_tx_hash: String,
    pub block_number: u64,
    pub destination_chain_id: u64,
    pub recipient: String,
    pub amount: String,
    pub relayed_at: u64,
}

impl SqliteStore {
    /// Open (or create) the database file and initialize schema
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for testing
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Lock("Failed to acquire lock".to_string()))
    }

    /// Look up one processed transfer
    pub fn get_processed(&self, transaction_id: &str) -> Result<Option<ProcessedTransferRow>, StoreError> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT transaction_id, source_tx_hash, block_number, destination_chain_id, recipient, amount, relayed_at
                 FROM processed_transfers WHERE transaction_id = ?1",
                params![transaction_id],
                read_row,
            )
            .optional()?;

        row.map(into_processed_row).transpose()
    }

    /// Most recently relayed transfers first
    pub fn recent_processed(&self, limit: u32, offset: u32) -> Result<Vec<ProcessedTransferRow>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT transaction_id, source_tx_hash, block_number, destination_chain_id, recipient, amount, relayed_at
             FROM processed_transfers
             ORDER BY block_number DESC, relayed_at DESC, transaction_id
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit, offset], read_row)?;

        let mut transfers = Vec::new();
        for row in rows {
            transfers.push(into_processed_row(row?)?);
        }

        Ok(transfers)
    }

    /// Unix timestamp of the last cursor update
    pub fn cursor_updated_at(&self) -> Result<Option<u64>, StoreError> {
        let conn = self.lock()?;

        let updated_at = conn
            .query_row("SELECT updated_at FROM listener_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        Ok(updated_at)
    }
}

type RawRow = (String, String, u64, String, String, String, u64);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_processed_row(raw: RawRow) -> Result<ProcessedTransferRow, StoreError> {
    let (transaction_id, source_tx_hash, block_number, chain_id, recipient, amount, relayed_at) = raw;
    let destination_chain_id = chain_id
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("destination_chain_id '{}' for {}", chain_id, transaction_id)))?;

    Ok(ProcessedTransferRow {
        transaction_id,
        source_tx_hash,
        block_number,
        destination_chain_id,
        recipient,
        amount,
        relayed_at,
    })
}

impl StateStore for SqliteStore {
    fn is_processed(&self, transaction_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM processed_transfers WHERE transaction_id = ?1",
                params![transaction_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    fn mark_processed(&mut self, record: &CanonicalTransferRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR IGNORE INTO processed_transfers
                (transaction_id, source_tx_hash, block_number, destination_chain_id, recipient, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.transaction_id,
                record.source_tx_hash,
                record.block_number,
                record.destination_chain_id.to_string(),
                record.recipient,
                record.amount
            ],
        )?;

        Ok(())
    }

    fn load_cursor(&self) -> Result<Option<u64>, StoreError> {
        let conn = self.lock()?;

        let cursor = conn
            .query_row("SELECT next_from_block FROM listener_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        Ok(cursor)
    }

    fn save_cursor(&mut self, next_from_block: u64) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO listener_state (id, next_from_block, updated_at)
             VALUES (1, ?1, strftime('%s', 'now'))
             ON CONFLICT(id) DO UPDATE SET
                next_from_block = excluded.next_from_block,
                updated_at = excluded.updated_at",
            params![next_from_block],
        )?;

        Ok(())
    }

    fn processed_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;

        let count: u64 = conn.query_row("SELECT COUNT(*) FROM processed_transfers", [], |row| row.get(0))?;

        Ok(count)
    }

    fn is_durable(&self) -> bool {
        true
    }
}
