pub mod client;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::CanonicalTransferRecord;

pub use client::RelayClient;

/// Final result of delivering one record, after all attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RelayOutcome {
    Delivered { attempts: u32, status: u16 },
    Failed { attempts: u32, last_error: String },
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RelayOutcome::Delivered { attempts, .. } | RelayOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Delivery of canonical records to the off-chain relayer
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, record: &CanonicalTransferRecord) -> RelayOutcome;
}
