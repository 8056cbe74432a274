//! Configuration module for the call bridge gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use callbridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

/// Default system instructions for the assistant.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful and friendly phone assistant. \
    Keep your answers short and conversational, and ask one question at a time.";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS, public host)
/// - Realtime model credentials and endpoint
/// - Assistant persona and session behavior
/// - Telephony REST credentials for call transfer
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Host name placed in the media-stream URL handed to the telephony side.
    /// Falls back to the request's `Host` header when unset.
    pub public_host: Option<String>,

    // Realtime model
    /// OpenAI API key (required)
    pub openai_api_key: String,
    pub openai_realtime_url: String,
    pub openai_realtime_model: String,

    // Assistant behavior
    pub voice: String,
    pub system_message: String,
    /// Utterance the assistant opens the call with
    pub opening_message: Option<String>,
    /// Whether the assistant speaks first on a new call
    pub speaks_first: bool,
    pub temperature: f32,
    /// Delay between the model socket opening and the session configuration
    pub session_init_delay_ms: u64,
    /// Tools declared to the model (must be registered tools)
    pub declared_tools: Vec<String>,
    /// Log playback timing calculations at debug level
    pub show_timing_math: bool,

    // Telephony REST API (call transfer)
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_base_url: String,
    /// Number live calls are transferred to
    pub transfer_phone_number: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.openai_api_key.zeroize();
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The .env file is loaded into the environment by `main` before this is
    /// called, so actual environment variables override .env values.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails
    /// (for example when `OPENAI_API_KEY` is missing).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables (with defaults) provide the base configuration and
    /// YAML values override them. The merged result is validated.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if live call transfer can be performed
    ///
    /// Returns true when the account SID, auth token and destination are all set
    pub fn has_call_transfer(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.twilio_account_sid)
            && set(&self.twilio_auth_token)
            && set(&self.transfer_phone_number)
    }

    /// Opening utterance to send, if the assistant speaks first
    pub fn opening_utterance(&self) -> Option<&str> {
        if !self.speaks_first {
            return None;
        }
        self.opening_message
            .as_deref()
            .filter(|msg| !msg.trim().is_empty())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        host: "localhost".to_string(),
        port: 5050,
        tls: None,
        public_host: None,
        openai_api_key: "test-openai-key".to_string(),
        openai_realtime_url: crate::core::realtime::OPENAI_REALTIME_URL.to_string(),
        openai_realtime_model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
        voice: "alloy".to_string(),
        system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
        opening_message: None,
        speaks_first: false,
        temperature: 0.8,
        session_init_delay_ms: 100,
        declared_tools: vec!["scheduleCallback".to_string(), "addToDNC".to_string()],
        show_timing_math: false,
        twilio_account_sid: None,
        twilio_auth_token: None,
        twilio_api_base_url: "https://api.twilio.com".to_string(),
        transfer_phone_number: None,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
    }
}
