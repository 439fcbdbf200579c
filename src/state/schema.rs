use rusqlite::{Connection, Result};

/// Initialize the state schema with required tables
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // One row per successfully relayed transfer
    conn.execute(
        "CREATE TABLE IF NOT EXISTS processed_transfers (
            transaction_id TEXT PRIMARY KEY,
            source_tx_hash TEXT NOT NULL,
            block_number INTEGER NOT NULL,
            destination_chain_id TEXT NOT NULL,
            recipient TEXT NOT NULL,
            amount TEXT NOT NULL,
            relayed_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS listener_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            next_from_block INTEGER NOT NULL,
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_processed_block ON processed_transfers(block_number)",
        [],
    )?;

    Ok(())
}
