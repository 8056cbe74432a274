//! Process-wide application state.
//!
//! Nothing here is mutated per call; each media stream owns its own relay
//! engine and session.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::telephony::{CallTransfer, TwilioCallTransfer};
use crate::core::tools::{ToolEnvironment, ToolRegistry, builtin_registry};

/// Shared state handed to every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub tools: Arc<ToolRegistry>,
    /// Live call transfer, present when credentials and destination are configured
    pub call_transfer: Option<Arc<dyn CallTransfer>>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let call_transfer = build_call_transfer(&config);
        Self::with_call_transfer(config, call_transfer)
    }

    /// Build state with an explicit transfer implementation.
    pub fn with_call_transfer(
        config: ServerConfig,
        call_transfer: Option<Arc<dyn CallTransfer>>,
    ) -> Arc<Self> {
        let tools = Arc::new(builtin_registry());
        info!(
            registered = ?tools.names(),
            declared = ?config.declared_tools,
            "Tool registry ready"
        );

        Arc::new(Self {
            config,
            tools,
            call_transfer,
        })
    }

    /// Collaborators made available to tool handlers on every call.
    pub fn tool_environment(&self) -> ToolEnvironment {
        ToolEnvironment {
            transfer: self.call_transfer.clone(),
            transfer_destination: self.config.transfer_phone_number.clone(),
        }
    }
}

fn build_call_transfer(config: &ServerConfig) -> Option<Arc<dyn CallTransfer>> {
    if !config.has_call_transfer() {
        info!("Call transfer not configured");
        return None;
    }

    let account_sid = config.twilio_account_sid.clone().unwrap_or_default();
    let auth_token = config.twilio_auth_token.clone().unwrap_or_default();
    match TwilioCallTransfer::new(
        account_sid,
        auth_token,
        Some(config.twilio_api_base_url.clone()),
    ) {
        Ok(transfer) => Some(Arc::new(transfer)),
        Err(e) => {
            warn!("Call transfer disabled: {}", e);
            None
        }
    }
}
