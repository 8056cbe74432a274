//! Telephony side of a call.
//!
//! - `messages`: media-stream frame codec
//! - `twiml`: call-control markup documents
//! - `transfer`: live call transfer through the REST API

pub mod messages;
pub mod transfer;
pub mod twiml;

use thiserror::Error;

pub use messages::{
    MarkPayload, MediaPayload, StreamStart, TelephonyIncoming, TelephonyOutgoing,
};
pub use transfer::{CallTransfer, TWILIO_API_BASE_URL, TwilioCallTransfer};

/// Errors raised by the telephony side of a call.
#[derive(Debug, Error)]
pub enum TelephonyError {
    /// A media-stream frame could not be parsed
    #[error("Invalid media stream frame: {0}")]
    InvalidFrame(String),

    /// Transfer credentials or destination are missing
    #[error("Call transfer not configured: {0}")]
    NotConfigured(String),

    /// The request itself is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The REST API answered with an error status
    #[error("Telephony API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Result type for telephony operations.
pub type TelephonyResult<T> = Result<T, TelephonyError>;
