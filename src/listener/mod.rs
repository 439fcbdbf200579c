pub mod cursor;
pub mod orchestrator;
pub mod shutdown;
pub mod status;

pub use cursor::{BlockCursor, ScanRange};
pub use orchestrator::{BridgeListener, CycleReport, ListenerSettings};
pub use shutdown::Shutdown;
pub use status::{ListenerState, ListenerStatus};
