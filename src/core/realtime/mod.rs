//! Realtime voice-model transport module.
//!
//! This module provides the abstraction and the OpenAI implementation of the
//! AI side of a phone call: one persistent WebSocket per call that accepts
//! caller audio and emits assistant audio, barge-in signals and tool calls.
//!
//! # Architecture
//!
//! - `BaseRealtime` trait for provider abstraction
//! - Factory function for provider creation by name
//! - Inbound events delivered on an mpsc channel, consumed by the relay loop
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge_gateway::core::realtime::{create_realtime_provider, RealtimeConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RealtimeConfig {
//!         api_key: "sk-...".to_string(),
//!         provider: "openai".to_string(),
//!         voice: Some("alloy".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let mut provider = create_realtime_provider("openai", config).unwrap();
//!     let mut events = provider.connect().await.unwrap();
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, FunctionDefinition, RealtimeConfig,
    RealtimeError, RealtimeEventStream, RealtimeResult, ToolDefinition, TurnDetectionConfig,
};
pub use openai::{
    ClientEvent, ConversationItem, OPENAI_REALTIME_URL, OpenAIRealtime,
    OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice, ServerEvent,
};

/// Supported realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeProvider {
    /// OpenAI Realtime API
    OpenAI,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(RealtimeProvider::OpenAI),
            _ => None,
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Factory function to create a realtime provider.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI Realtime API
pub fn create_realtime_provider(
    provider_type: &str,
    config: RealtimeConfig,
) -> RealtimeResult<BoxedRealtime> {
    match RealtimeProvider::parse(provider_type) {
        Some(RealtimeProvider::OpenAI) => Ok(Box::new(OpenAIRealtime::new(config)?)),
        None => Err(RealtimeError::InvalidConfiguration(format!(
            "Unsupported realtime provider '{}'. Supported providers: {}",
            provider_type,
            get_supported_realtime_providers().join(", ")
        ))),
    }
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["openai"]
}
