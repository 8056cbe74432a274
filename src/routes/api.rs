use axum::{
    Router,
    routing::{any, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, twilio};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP router
///
/// - `GET /` health check
/// - `ANY /incoming-call` call-setup webhook (form POST or GET query)
/// - `POST /transfer` live call transfer
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/incoming-call", any(twilio::incoming_call))
        .route("/transfer", post(twilio::transfer_call))
        .layer(TraceLayer::new_for_http())
}
