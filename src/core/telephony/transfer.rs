//! Live call transfer through the telephony REST API.
//!
//! Transferring a call replaces its current flow (the AI media stream) with an
//! announcement followed by a dial to the destination number.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use zeroize::Zeroize;

use super::twiml::{TRANSFER_ANNOUNCEMENT, transfer_dial};
use super::{TelephonyError, TelephonyResult};

/// Default base URL of the telephony REST API.
pub const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirects a live call to another party.
#[async_trait]
pub trait CallTransfer: Send + Sync {
    /// Redirect `call_sid` to `destination`.
    async fn transfer_call(&self, call_sid: &str, destination: &str) -> TelephonyResult<()>;
}

/// REST implementation of [`CallTransfer`].
pub struct TwilioCallTransfer {
    client: Client,
    account_sid: String,
    auth_token: String,
    api_base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl TwilioCallTransfer {
    /// Create a transfer client for an account.
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        api_base_url: Option<String>,
    ) -> TelephonyResult<Self> {
        let account_sid = account_sid.into();
        let auth_token = auth_token.into();

        if account_sid.trim().is_empty() || auth_token.trim().is_empty() {
            return Err(TelephonyError::NotConfigured(
                "account SID and auth token are required".to_string(),
            ));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            account_sid,
            auth_token,
            api_base_url: api_base_url.unwrap_or_else(|| TWILIO_API_BASE_URL.to_string()),
        })
    }

    fn call_url(&self, call_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base_url.trim_end_matches('/'),
            self.account_sid,
            call_sid
        )
    }
}

impl Drop for TwilioCallTransfer {
    fn drop(&mut self) {
        self.auth_token.zeroize();
    }
}

fn validate_call_sid(call_sid: &str) -> TelephonyResult<()> {
    if call_sid.is_empty() || !call_sid.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TelephonyError::InvalidRequest(format!(
            "invalid call SID '{call_sid}'"
        )));
    }
    Ok(())
}

#[async_trait]
impl CallTransfer for TwilioCallTransfer {
    async fn transfer_call(&self, call_sid: &str, destination: &str) -> TelephonyResult<()> {
        validate_call_sid(call_sid)?;
        if destination.trim().is_empty() {
            return Err(TelephonyError::NotConfigured(
                "transfer destination is empty".to_string(),
            ));
        }

        let markup = transfer_dial(TRANSFER_ANNOUNCEMENT, destination);
        let response = self
            .client
            .post(self.call_url(call_sid))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Twiml", markup.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(TelephonyError::Api { status, message });
        }

        info!(call_sid, destination, "Call transferred");
        Ok(())
    }
}
