//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `twilio` - Call-setup webhook and live call transfer
//! - `media_stream` - Telephony media-stream WebSocket relayed to the realtime model

pub mod api;
pub mod media_stream;
pub mod twilio;

// Re-export commonly used handlers for convenient access
pub use media_stream::media_stream_handler;
