//! Relay between the telephony media stream and the realtime model.

pub mod engine;

pub use engine::{PendingToolCall, RelayAction, RelayEngine, ToolOutcome};
