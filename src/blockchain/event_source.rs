use async_trait::async_trait;

use crate::blockchain::event_schema::EventSchema;
use crate::blockchain::normalizer::{normalize_address, validate_address};
use crate::error::{BindingError, RpcError};
use crate::models::RawLog;

/// A contract address paired with the event topic being watched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractBinding {
    pub address: String,
    pub event_name: String,
    pub topic0: String,
}

impl ContractBinding {
    pub fn bind(address: &str, schema: &EventSchema) -> Result<Self, BindingError> {
        validate_address(address).map_err(|e| BindingError::InvalidAddress(format!("{}: {}", address, e)))?;

        Ok(Self {
            address: format!("0x{}", normalize_address(address)),
            event_name: schema.name.clone(),
            topic0: schema.topic0(),
        })
    }
}

/// The chain-facing side of the listener: height, liveness and log queries
#[async_trait]
pub trait EventSource: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn is_connected(&self) -> bool;

    async fn reconnect(&mut self) -> Result<(), RpcError>;

    async fn latest_block(&self) -> Result<u64, RpcError>;

    /// Logs emitted by `contract` with its topic0 in the inclusive range `[from, to]`
    async fn fetch_logs(&self, contract: &ContractBinding, from: u64, to: u64) -> Result<Vec<RawLog>, RpcError>;
}
