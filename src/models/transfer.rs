use serde::{Deserialize, Serialize};

/// A log entry as returned by `eth_getLogs`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u32,
    #[serde(default)]
    pub removed: bool,
}

/// Normalized representation of one `TokensLocked` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalTransferRecord {
    pub transaction_id: String,
    pub destination_chain_id: u64,
    pub recipient: String,
    pub amount: String,  // Decimal string, never a float
    pub source_tx_hash: String,
    pub block_number: u64,
}

/// Wire body posted to the relayer endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub source_transaction_id: String,
    pub destination_chain_id: u64,
    pub recipient: String,
    pub amount: String,
    pub source_transaction_hash: String,
}

impl From<&CanonicalTransferRecord> for RelayPayload {
    fn from(record: &CanonicalTransferRecord) -> Self {
        Self {
            source_transaction_id: record.transaction_id.clone(),
            destination_chain_id: record.destination_chain_id,
            recipient: record.recipient.clone(),
            amount: record.amount.clone(),
            source_transaction_hash: record.source_tx_hash.clone(),
        }
    }
}
