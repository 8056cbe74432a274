//! OpenAI Realtime API WebSocket message types.
//!
//! This module defines the client and server event types exchanged with the
//! Realtime API during a phone call. All events are JSON text frames tagged by
//! a `type` field.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Configure voice, instructions, audio formats, VAD, tools
//! - input_audio_buffer.append - Append caller audio
//! - conversation.item.create - Add a message or a function-call output
//! - conversation.item.truncate - Cut an assistant item at the audio heard so far
//! - response.create - Ask the model to respond
//!
//! Server events (received from server) that drive the relay:
//! - response.audio.delta - Assistant audio chunk
//! - input_audio_buffer.speech_started - Caller started talking
//! - response.output_item.done - Output item finished (function calls)
//!
//! Every other event type is parsed leniently and surfaced for logging only.

use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for OpenAI Realtime API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

/// Tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (message, function_call, function_call_output)
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Item role (user, assistant, system)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Call ID for function call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name for function call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments for function call (JSON text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function output for function call result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// Whether this item is a completed function-call request.
    pub fn is_function_call(&self) -> bool {
        self.item_type == "function_call"
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, input_audio, text, audio)
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Audio content (base64 encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Transcript of audio content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
        /// Previous item ID to insert after
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
    },

    /// Truncate a conversation item
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        /// Item ID
        item_id: String,
        /// Content index
        content_index: u32,
        /// Audio end in ms
        audio_end_ms: u64,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Append an already-encoded caller audio payload.
    pub fn audio_append(payload: impl Into<String>) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: payload.into(),
        }
    }

    /// Truncate an assistant item at the given playback offset.
    pub fn truncate(item_id: impl Into<String>, audio_end_ms: u64) -> Self {
        ClientEvent::ConversationItemTruncate {
            item_id: item_id.into(),
            content_index: 0,
            audio_end_ms,
        }
    }

    /// Return the result of a function call to the conversation.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem {
                item_type: "function_call_output".to_string(),
                call_id: Some(call_id.into()),
                output: Some(output.into()),
                ..Default::default()
            },
            previous_item_id: None,
        }
    }

    /// Seed an assistant utterance, used when the assistant speaks first.
    pub fn assistant_message(text: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem {
                item_type: "message".to_string(),
                role: Some("assistant".to_string()),
                content: Some(vec![ContentPart {
                    content_type: "text".to_string(),
                    text: Some(text.into()),
                    audio: None,
                    transcript: None,
                }]),
                ..Default::default()
            },
            previous_item_id: None,
        }
    }

    /// Wire name of the event, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ConversationItemTruncate { .. } => "conversation.item.truncate",
            ClientEvent::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
///
/// Fields the relay does not rely on are optional so that minor protocol
/// drift does not turn a usable event into a parse failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: Session,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: Session,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio start timestamp in ms
        #[serde(default)]
        audio_start_ms: u64,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        /// Audio end timestamp in ms
        #[serde(default)]
        audio_end_ms: u64,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Audio buffer committed
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        /// New item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Response created
    #[serde(rename = "response.created")]
    ResponseCreated {
        /// Response information
        response: Response,
    },

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response information
        response: Response,
    },

    /// Output item done
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Response ID
        #[serde(default)]
        response_id: Option<String>,
        /// Output index
        #[serde(default)]
        output_index: u32,
        /// Completed item
        item: ConversationItem,
    },

    /// Audio delta (audio data chunk)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Response ID
        #[serde(default)]
        response_id: Option<String>,
        /// Item ID of the assistant message being spoken
        #[serde(default)]
        item_id: Option<String>,
        /// Base64-encoded audio delta
        delta: String,
    },

    /// Audio done
    #[serde(rename = "response.audio.done")]
    AudioDone {
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Rate limits updated
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        /// Rate limit information
        #[serde(default)]
        rate_limits: Vec<RateLimit>,
    },

    /// Any event type the relay does not act on
    #[serde(other)]
    Unhandled,
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
    /// Parameter that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Event ID that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Session information.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Session ID
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Voice
    #[serde(default)]
    pub voice: Option<String>,
}

/// Response information.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Response ID
    #[serde(default)]
    pub id: String,
    /// Response status
    #[serde(default)]
    pub status: Option<String>,
    /// Output items
    #[serde(default)]
    pub output: Vec<ConversationItem>,
}

/// Rate limit information.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    /// Rate limit name
    pub name: String,
    /// Limit value
    #[serde(default)]
    pub limit: u64,
    /// Remaining value
    #[serde(default)]
    pub remaining: u64,
    /// Seconds until reset
    #[serde(default)]
    pub reset_seconds: f64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audio_append_keeps_payload_opaque() {
        let event = ClientEvent::audio_append("AAEC");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({"type": "input_audio_buffer.append", "audio": "AAEC"})
        );
    }

    #[test]
    fn test_truncate_serialization() {
        let json = serde_json::to_value(ClientEvent::truncate("it1", 800)).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "conversation.item.truncate",
                "item_id": "it1",
                "content_index": 0,
                "audio_end_ms": 800
            })
        );
    }

    #[test]
    fn test_function_call_output_serialization() {
        let json =
            serde_json::to_value(ClientEvent::function_call_output("c1", "Added to DNC")).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "function_call_output",
                    "call_id": "c1",
                    "output": "Added to DNC"
                }
            })
        );
    }

    #[test]
    fn test_response_create_serialization() {
        let json = serde_json::to_value(ClientEvent::ResponseCreate).unwrap();
        assert_eq!(json, json!({"type": "response.create"}));
    }

    #[test]
    fn test_assistant_message_serialization() {
        let json = serde_json::to_value(ClientEvent::assistant_message("Hi there")).unwrap();
        assert_eq!(json["item"]["type"], "message");
        assert_eq!(json["item"]["role"], "assistant");
        assert_eq!(json["item"]["content"][0]["type"], "text");
        assert_eq!(json["item"]["content"][0]["text"], "Hi there");
    }

    #[test]
    fn test_session_update_serialization() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: Some(vec!["text".to_string(), "audio".to_string()]),
                voice: Some("alloy".to_string()),
                input_audio_format: Some("g711_ulaw".to_string()),
                turn_detection: Some(TurnDetection::ServerVad {
                    threshold: Some(0.5),
                    prefix_padding_ms: Some(300),
                    silence_duration_ms: Some(500),
                }),
                tool_choice: Some("auto".to_string()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["voice"], "alloy");
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(json["session"]["turn_detection"]["silence_duration_ms"], 500);
        assert!(json["session"].get("instructions").is_none());
        assert_eq!(event.event_type(), "session.update");
    }

    #[test]
    fn test_error_event_deserialization() {
        let json = r#"{
            "type": "error",
            "error": {
                "type": "invalid_request_error",
                "message": "Test error"
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.error_type, "invalid_request_error");
                assert_eq!(error.message, "Test error");
            }
            _ => panic!("Expected Error event"),
        }
    }

    #[test]
    fn test_audio_delta_with_minimal_fields() {
        let json = r#"{"type": "response.audio.delta", "delta": "UklGRg==", "item_id": "it1"}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::AudioDelta {
                delta,
                item_id,
                response_id,
            } => {
                assert_eq!(delta, "UklGRg==");
                assert_eq!(item_id.as_deref(), Some("it1"));
                assert!(response_id.is_none());
            }
            _ => panic!("Expected AudioDelta event"),
        }
    }

    #[test]
    fn test_function_call_item_done() {
        let json = r#"{
            "type": "response.output_item.done",
            "response_id": "resp_1",
            "output_index": 0,
            "item": {
                "id": "item_9",
                "type": "function_call",
                "status": "completed",
                "name": "addToDNC",
                "call_id": "c1",
                "arguments": "{\"phone\":\"5551234\"}"
            }
        }"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::OutputItemDone { item, .. } => {
                assert!(item.is_function_call());
                assert_eq!(item.name.as_deref(), Some("addToDNC"));
                assert_eq!(item.call_id.as_deref(), Some("c1"));
            }
            _ => panic!("Expected OutputItemDone event"),
        }
    }

    #[test]
    fn test_unknown_event_is_unhandled() {
        let json = r#"{"type": "response.audio_transcript.delta", "delta": "hi"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::Unhandled));
    }

    #[test]
    fn test_speech_started_without_item_id() {
        let json = r#"{"type": "input_audio_buffer.speech_started", "audio_start_ms": 1200}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::SpeechStarted {
                audio_start_ms,
                item_id,
            } => {
                assert_eq!(audio_start_ms, 1200);
                assert!(item_id.is_none());
            }
            _ => panic!("Expected SpeechStarted event"),
        }
    }
}
