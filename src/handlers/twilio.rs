//! Telephony webhook handlers
//!
//! - `incoming_call` answers the call-setup webhook with markup that connects
//!   the call to the media-stream WebSocket
//! - `transfer_call` redirects a live call to the configured agent number

use axum::{
    Json,
    extract::{Form, State, rejection::FormRejection},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::telephony::twiml::{media_stream_url, stream_connect};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

const XML_CONTENT_TYPE: &str = "text/xml";

/// Call-setup webhook parameters.
///
/// The platform posts many more fields; only the call identifier is used.
#[derive(Debug, Default, Deserialize)]
pub struct IncomingCall {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
}

/// Body of a transfer request.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "callSid")]
    pub call_sid: String,
}

fn public_host<'a>(state: &'a AppState, headers: &'a HeaderMap) -> Option<&'a str> {
    state
        .config
        .public_host
        .as_deref()
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .filter(|host| !host.is_empty())
}

/// Call-setup webhook
///
/// Accepts the webhook as a form POST or as query parameters on GET and
/// returns markup connecting the call audio to `/media-stream`. The call
/// identifier travels with the stream as the `callSid` custom parameter.
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<IncomingCall>, FormRejection>,
) -> AppResult<Response> {
    let call = match form {
        Ok(Form(call)) => call,
        Err(e) => {
            debug!("Incoming call without form parameters: {}", e);
            IncomingCall::default()
        }
    };

    let host = public_host(&state, &headers)
        .ok_or_else(|| AppError::BadRequest("Unable to determine public host".to_string()))?;

    let call_sid = call.call_sid.unwrap_or_default();
    info!(call_sid = %call_sid, "Incoming call");

    let parameters: Vec<(&str, &str)> = if call_sid.is_empty() {
        Vec::new()
    } else {
        vec![("callSid", call_sid.as_str())]
    };
    let body = stream_connect(&media_stream_url(host), &parameters);

    Ok(([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response())
}

/// Transfer a live call to the configured agent number
pub async fn transfer_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<Value>> {
    let transfer = state.call_transfer.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Call transfer is not configured".to_string())
    })?;
    let destination = state
        .config
        .transfer_phone_number
        .as_deref()
        .ok_or_else(|| AppError::ServiceUnavailable("No transfer number configured".to_string()))?;

    info!(call_sid = %request.call_sid, "Transfer requested");
    transfer.transfer_call(&request.call_sid, destination).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Call transferred successfully"
    })))
}
