pub mod transfer;

pub use transfer::{CanonicalTransferRecord, RawLog, RelayPayload};
