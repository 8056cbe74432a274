//! Media-stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::core::telephony::twiml::MEDIA_STREAM_PATH;
use crate::handlers::media_stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media-stream WebSocket router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for the telephony media stream
///
/// # Protocol
///
/// The telephony side sends JSON text frames tagged by `event`:
/// `connected`, `start`, `media`, `mark`, `dtmf`, `stop`.
///
/// The gateway answers with `media` (assistant audio), `mark` (playback
/// checkpoint) and `clear` (flush buffered audio on barge-in).
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
