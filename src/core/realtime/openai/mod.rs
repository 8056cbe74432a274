//! OpenAI Realtime API module.
//!
//! Speech-to-speech conversation with a GPT-4o realtime model over a single
//! WebSocket per phone call.
//!
//! # Features
//!
//! - G.711 u-law audio in both directions, forwarded as opaque base64
//! - Server-side voice activity detection (barge-in signal)
//! - Function calling
//! - Truncation of assistant items that were only partly heard
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse

mod client;
mod config;
mod messages;

pub use client::{LOGGED_EVENT_TYPES, OpenAIRealtime};
pub use config::{
    OPENAI_REALTIME_PHONE_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, RateLimit, Response, ServerEvent,
    Session, SessionConfig, ToolDef, TurnDetection,
};
