//! Merging of environment and YAML configuration.
//!
//! Environment variables (with defaults) form the base; any value present in
//! the YAML file replaces the environment value.

use std::path::PathBuf;

use super::env::{env_bool, env_list, env_parse, env_var};
use super::validation::resolve_tls;
use super::yaml::YamlConfig;
use super::{DEFAULT_SYSTEM_MESSAGE, ServerConfig};
use crate::core::realtime::{OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice};
use crate::core::telephony::TWILIO_API_BASE_URL;
use crate::core::tools::DEFAULT_DECLARED_TOOLS;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5050;
const DEFAULT_TEMPERATURE: f32 = 0.8;
const DEFAULT_SESSION_INIT_DELAY_MS: u64 = 100;
const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// Build the final configuration from the environment and optional YAML.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();
    let openai = yaml.openai.unwrap_or_default();
    let assistant = yaml.assistant.unwrap_or_default();
    let twilio = yaml.twilio.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls = resolve_tls(
        tls_yaml
            .cert_path
            .or_else(|| env_var("TLS_CERT_PATH"))
            .map(PathBuf::from),
        tls_yaml
            .key_path
            .or_else(|| env_var("TLS_KEY_PATH"))
            .map(PathBuf::from),
    )?;

    let declared_tools = assistant
        .declared_tools
        .or_else(|| env_list("DECLARED_TOOLS"))
        .unwrap_or_else(|| {
            DEFAULT_DECLARED_TOOLS
                .iter()
                .map(|name| name.to_string())
                .collect()
        });

    Ok(ServerConfig {
        host: server
            .host
            .or_else(|| env_var("HOST"))
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: match server.port {
            Some(port) => port,
            None => env_parse("PORT", DEFAULT_PORT)?,
        },
        tls,
        public_host: server.public_host.or_else(|| env_var("PUBLIC_HOST")),

        openai_api_key: openai
            .api_key
            .or_else(|| env_var("OPENAI_API_KEY"))
            .unwrap_or_default(),
        openai_realtime_url: openai
            .realtime_url
            .or_else(|| env_var("OPENAI_REALTIME_URL"))
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        openai_realtime_model: openai
            .model
            .or_else(|| env_var("OPENAI_REALTIME_MODEL"))
            .unwrap_or_else(|| OpenAIRealtimeModel::default().as_str().to_string()),

        voice: assistant
            .voice
            .or_else(|| env_var("VOICE"))
            .unwrap_or_else(|| OpenAIRealtimeVoice::default().as_str().to_string()),
        system_message: assistant
            .system_message
            .or_else(|| env_var("SYSTEM_MESSAGE"))
            .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string()),
        opening_message: assistant
            .opening_message
            .or_else(|| env_var("OPENING_MESSAGE")),
        speaks_first: match assistant.speaks_first {
            Some(flag) => flag,
            None => env_bool("INBOUND_CALL", false)?,
        },
        temperature: match assistant.temperature {
            Some(t) => t,
            None => env_parse("TEMPERATURE", DEFAULT_TEMPERATURE)?,
        },
        session_init_delay_ms: match assistant.session_init_delay_ms {
            Some(ms) => ms,
            None => env_parse("SESSION_INIT_DELAY_MS", DEFAULT_SESSION_INIT_DELAY_MS)?,
        },
        declared_tools,
        show_timing_math: match assistant.show_timing_math {
            Some(flag) => flag,
            None => env_bool("SHOW_TIMING_MATH", false)?,
        },

        twilio_account_sid: twilio.account_sid.or_else(|| env_var("TWILIO_ACCOUNT_SID")),
        twilio_auth_token: twilio.auth_token.or_else(|| env_var("TWILIO_AUTH_TOKEN")),
        twilio_api_base_url: twilio
            .api_base_url
            .or_else(|| env_var("TWILIO_API_BASE_URL"))
            .unwrap_or_else(|| TWILIO_API_BASE_URL.to_string()),
        transfer_phone_number: twilio
            .transfer_phone_number
            .or_else(|| env_var("TRANSFER_PHONE_NUMBER")),

        cors_allowed_origins: security
            .cors_allowed_origins
            .or_else(|| env_var("CORS_ALLOWED_ORIGINS")),
        rate_limit_requests_per_second: match security.rate_limit_requests_per_second {
            Some(rps) => rps,
            None => env_parse("RATE_LIMIT_REQUESTS_PER_SECOND", DEFAULT_RATE_LIMIT_RPS)?,
        },
        rate_limit_burst_size: match security.rate_limit_burst_size {
            Some(burst) => burst,
            None => env_parse("RATE_LIMIT_BURST_SIZE", DEFAULT_RATE_LIMIT_BURST)?,
        },
    })
}
