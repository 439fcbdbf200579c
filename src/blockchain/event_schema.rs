//! Declarative description of the watched contract event.
//!
//! The normalizer reads field positions from an [`EventSchema`] instead of
//! hard-coding them, so a different transfer event only needs a new schema.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// ABI types the normalizer knows how to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Address,
    Uint256,
    Bytes32,
}

impl ParamKind {
    pub fn solidity_type(&self) -> &'static str {
        match self {
            ParamKind::Address => "address",
            ParamKind::Uint256 => "uint256",
            ParamKind::Bytes32 => "bytes32",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    pub name: String,
    pub kind: ParamKind,
    pub indexed: bool,
}

/// Where a parameter's 32-byte word lives inside a log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    /// Index into `topics` (topic 0 is the event signature, so this starts at 1)
    Topic(usize),
    /// Word offset into `data`
    Data(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSchema {
    pub name: String,
    pub params: Vec<EventParam>,
}

impl EventSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, kind: ParamKind, indexed: bool) -> Self {
        self.params.push(EventParam {
            name: name.to_string(),
            kind,
            indexed,
        });
        self
    }

    /// Canonical signature, e.g. `TokensLocked(address,uint256,address,uint256,bytes32)`
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.params.iter().map(|p| p.kind.solidity_type()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// keccak-256 of the signature as `0x`-prefixed lowercase hex
    pub fn topic0(&self) -> String {
        let hash = Keccak256::digest(self.signature().as_bytes());
        format!("0x{}", hex::encode(hash))
    }

    pub fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }

    /// Minimum `data` length in bytes
    pub fn data_len(&self) -> usize {
        self.params.iter().filter(|p| !p.indexed).count() * 32
    }

    pub fn find(&self, name: &str) -> Option<&EventParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn locate(&self, name: &str) -> Option<ParamLocation> {
        let mut topic = 1;
        let mut word = 0;
        for param in &self.params {
            if param.name == name {
                return Some(if param.indexed {
                    ParamLocation::Topic(topic)
                } else {
                    ParamLocation::Data(word)
                });
            }
            if param.indexed {
                topic += 1;
            } else {
                word += 1;
            }
        }
        None
    }
}

/// `TokensLocked(address indexed sender, uint256 destinationChainId,
/// address indexed recipient, uint256 amount, bytes32 indexed transactionId)`
pub static TOKENS_LOCKED: Lazy<EventSchema> = Lazy::new(|| {
    EventSchema::new("TokensLocked")
        .param("sender", ParamKind::Address, true)
        .param("destinationChainId", ParamKind::Uint256, false)
        .param("recipient", ParamKind::Address, true)
        .param("amount", ParamKind::Uint256, false)
        .param("transactionId", ParamKind::Bytes32, true)
});
