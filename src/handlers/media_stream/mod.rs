//! Telephony media-stream WebSocket.
//!
//! One connection per phone call. Each connection opens its own realtime model
//! session and runs a relay engine between the two.

mod handler;

pub use handler::{build_realtime_config, media_stream_handler};
