pub mod event_schema;
pub mod event_source;
pub mod normalizer;
pub mod rpc_client;

pub use event_schema::{EventParam, EventSchema, ParamKind, ParamLocation, TOKENS_LOCKED};
pub use event_source::{ContractBinding, EventSource};
pub use normalizer::{normalize_address, strip_hex_prefix, validate_address, EventNormalizer};
pub use rpc_client::{LogFilter, RpcClient};
