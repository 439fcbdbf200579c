use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Disconnected,
    ConnectedIdle,
    Scanning,
    ErrorBackoff,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Disconnected => "disconnected",
            ListenerState::ConnectedIdle => "connected_idle",
            ListenerState::Scanning => "scanning",
            ListenerState::ErrorBackoff => "error_backoff",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot published after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerStatus {
    pub state: ListenerState,
    pub contract_address: String,
    pub next_from_block: Option<u64>,
    pub last_seen_height: Option<u64>,
    pub processed_count: u64,
    pub relayed_total: u64,
    pub skipped_total: u64,
    pub failed_total: u64,
    pub normalization_failures: u64,
    pub pending_requeue: usize,
    /// Queued records given up on (queue full or retry cycles exhausted)
    pub requeue_dropped: u64,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ListenerStatus {
    pub fn new(contract_address: &str) -> Self {
        Self {
            state: ListenerState::Disconnected,
            contract_address: contract_address.to_string(),
            next_from_block: None,
            last_seen_height: None,
            processed_count: 0,
            relayed_total: 0,
            skipped_total: 0,
            failed_total: 0,
            normalization_failures: 0,
            pending_requeue: 0,
            requeue_dropped: 0,
            cycles: 0,
            last_cycle_at: None,
            last_error: None,
        }
    }
}
