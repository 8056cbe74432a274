//! Telephony media-stream WebSocket message types.
//!
//! Frames are JSON text messages tagged by an `event` field. Inbound frames
//! carry the stream lifecycle, caller audio and playback acknowledgements;
//! outbound frames carry assistant audio, playback markers and buffer clears.
//!
//! # Protocol Overview
//!
//! Inbound (telephony to relay):
//! - connected - Socket handshake metadata
//! - start - Stream metadata (`start.streamSid`, `start.callSid`, custom parameters)
//! - media - Caller audio (`media.payload`, `media.timestamp` in ms)
//! - mark - A previously sent marker finished playing
//! - dtmf - Keypad digit
//! - stop - Stream ended
//!
//! Outbound (relay to telephony):
//! - media - Assistant audio to play
//! - mark - Marker played after the preceding audio
//! - clear - Discard any audio still buffered for playback

use std::collections::HashMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::{TelephonyError, TelephonyResult};

// =============================================================================
// Inbound Frames
// =============================================================================

/// Frames received from the telephony media stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyIncoming {
    /// Socket handshake metadata
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },

    /// Stream started
    Start {
        /// Stream identifier repeated at the top level
        #[serde(default, rename = "streamSid")]
        stream_sid: Option<String>,
        /// Stream metadata
        start: StreamStart,
    },

    /// Caller audio chunk
    Media {
        /// Audio payload and timing
        media: MediaPayload,
    },

    /// Playback marker acknowledgement
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },

    /// Keypad digit
    Dtmf {
        #[serde(default)]
        dtmf: Option<DtmfPayload>,
    },

    /// Stream ended
    Stop {
        #[serde(default, rename = "streamSid")]
        stream_sid: Option<String>,
    },

    /// Any other frame kind
    #[serde(other)]
    Unknown,
}

impl TelephonyIncoming {
    /// Parse a text frame.
    pub fn parse(text: &str) -> TelephonyResult<Self> {
        serde_json::from_str(text).map_err(|e| TelephonyError::InvalidFrame(e.to_string()))
    }

    /// Frame kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            TelephonyIncoming::Connected { .. } => "connected",
            TelephonyIncoming::Start { .. } => "start",
            TelephonyIncoming::Media { .. } => "media",
            TelephonyIncoming::Mark { .. } => "mark",
            TelephonyIncoming::Dtmf { .. } => "dtmf",
            TelephonyIncoming::Stop { .. } => "stop",
            TelephonyIncoming::Unknown => "unknown",
        }
    }
}

/// Metadata carried by a `start` frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    /// Stream identifier
    #[serde(default)]
    pub stream_sid: Option<String>,
    /// Call identifier
    #[serde(default)]
    pub call_sid: Option<String>,
    /// Account identifier
    #[serde(default)]
    pub account_sid: Option<String>,
    /// Tracks included in the stream
    #[serde(default)]
    pub tracks: Vec<String>,
    /// Parameters attached by the stream-connect markup
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
    /// Audio encoding of the stream
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

impl StreamStart {
    /// Call identifier, from the metadata or the `callSid` custom parameter.
    pub fn resolved_call_sid(&self) -> Option<&str> {
        self.call_sid
            .as_deref()
            .or_else(|| self.custom_parameters.get("callSid").map(String::as_str))
            .filter(|sid| !sid.is_empty())
    }
}

/// Audio encoding reported by the stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
}

/// Caller audio chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Track name (inbound/outbound)
    #[serde(default)]
    pub track: Option<String>,
    /// Milliseconds since stream start; sent as a string or a number
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
    /// Base64-encoded audio
    pub payload: String,
}

/// Named playback marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Keypad digit.
#[derive(Debug, Clone, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub digit: Option<String>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Integer(u64),
        Float(f64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Integer(value) => Ok(value),
        RawTimestamp::Float(value) if value.is_finite() && value >= 0.0 => Ok(value as u64),
        RawTimestamp::Float(value) => Err(de::Error::custom(format!(
            "invalid media timestamp {value}"
        ))),
        RawTimestamp::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| de::Error::custom(format!("invalid media timestamp '{text}': {e}"))),
    }
}

// =============================================================================
// Outbound Frames
// =============================================================================

/// Frames sent to the telephony media stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyOutgoing {
    /// Assistant audio to play
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutgoingMedia,
    },

    /// Marker acknowledged once the preceding audio has played
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },

    /// Drop any audio still buffered for playback
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Outbound audio payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMedia {
    pub payload: String,
}

impl TelephonyOutgoing {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        TelephonyOutgoing::Media {
            stream_sid: stream_sid.into(),
            media: OutgoingMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn mark(stream_sid: impl Into<String>, name: impl Into<String>) -> Self {
        TelephonyOutgoing::Mark {
            stream_sid: stream_sid.into(),
            mark: MarkPayload { name: name.into() },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        TelephonyOutgoing::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}
