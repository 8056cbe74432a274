//! Base traits and types for realtime voice-model transports.
//!
//! A realtime transport owns one persistent WebSocket to a voice model for the
//! lifetime of a single phone call. Outbound protocol events are queued through
//! [`BaseRealtime::send_event`]; inbound events are delivered in arrival order
//! on the channel returned by [`BaseRealtime::connect`].
//!
//! # Audio Format
//!
//! Phone audio is carried as base64-encoded G.711 u-law at 8kHz in both
//! directions. Payloads are never decoded into samples.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use super::openai::{ClientEvent, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Session configuration for a realtime provider.
///
/// Built once per call from the server configuration and the tool registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// Provider name (e.g., "openai")
    #[serde(default)]
    pub provider: String,

    /// WebSocket endpoint; the provider default is used when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model to use (e.g., "gpt-4o-realtime-preview-2024-10-01")
    #[serde(default)]
    pub model: String,

    /// Voice ID for audio output
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    /// Temperature for response generation (0.0 to 2.0)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Input audio format
    #[serde(default)]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(default)]
    pub output_audio_format: Option<String>,

    /// Turn detection configuration
    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// Tool definitions declared to the model
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Tool choice strategy
    #[serde(default)]
    pub tool_choice: Option<String>,

    /// Response modalities (text, audio, or both)
    #[serde(default)]
    pub modalities: Option<Vec<String>>,

    /// Utterance the assistant speaks before the caller says anything.
    /// `None` means the caller speaks first.
    #[serde(default)]
    pub opening_message: Option<String>,

    /// Delay between the socket opening and the session configuration being sent
    #[serde(default)]
    pub session_init_delay_ms: u64,
}

/// Configuration for turn detection (VAD).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side voice activity detection
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default)]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
    /// No automatic turn detection
    #[serde(rename = "none")]
    None,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Wrap a function definition as a `function` tool.
    pub fn function(function: FunctionDefinition) -> Self {
        Self {
            tool_type: "function".to_string(),
            function,
        }
    }
}

/// Function definition for tool calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Inbound event stream of a connected provider.
///
/// The sender half is dropped when the provider socket closes, so `recv()`
/// returning `None` means the AI side of the call is gone.
pub type RealtimeEventStream = mpsc::Receiver<ServerEvent>;

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for realtime voice-model transports.
///
/// # Example
///
/// ```rust,ignore
/// use callbridge_gateway::core::realtime::{BaseRealtime, OpenAIRealtime, RealtimeConfig};
///
/// let mut realtime = OpenAIRealtime::new(RealtimeConfig {
///     api_key: "sk-...".to_string(),
///     ..Default::default()
/// })?;
/// let mut events = realtime.connect().await?;
/// while let Some(event) = events.recv().await {
///     // hand the event to the relay engine
/// }
/// ```
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Create a new realtime provider instance.
    fn new(config: RealtimeConfig) -> RealtimeResult<Self>
    where
        Self: Sized;

    /// Open the socket and schedule session initialisation.
    ///
    /// Returns the stream of inbound provider events.
    async fn connect(&mut self) -> RealtimeResult<RealtimeEventStream>;

    /// Close the socket if it is still open.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    /// Check if the provider socket is open.
    fn is_ready(&self) -> bool;

    /// Get the current connection state.
    fn get_connection_state(&self) -> ConnectionState;

    /// Queue a protocol event for the provider.
    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()>;

    /// Get provider information.
    fn get_provider_info(&self) -> serde_json::Value;
}

/// Boxed trait object for realtime providers.
pub type BoxedRealtime = Box<dyn BaseRealtime>;
