//! Configuration validation logic.

use std::path::PathBuf;

use super::{ServerConfig, TlsConfig};
use crate::core::tools::BUILTIN_TOOL_NAMES;

/// Validate a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_openai_api_key(&config.openai_api_key)?;
    validate_temperature(config.temperature)?;
    validate_declared_tools(&config.declared_tools)?;
    validate_rate_limit(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    Ok(())
}

/// The model credentials are required; the gateway has no degraded mode.
pub(super) fn validate_openai_api_key(key: &str) -> Result<(), String> {
    if key.trim().is_empty() {
        return Err(
            "Missing OpenAI API key. Set OPENAI_API_KEY in the environment or the .env file."
                .to_string(),
        );
    }
    Ok(())
}

pub(super) fn validate_temperature(temperature: f32) -> Result<(), String> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(format!(
            "Invalid TEMPERATURE {temperature}: must be between 0.0 and 2.0"
        ));
    }
    Ok(())
}

/// Every declared tool must have a registered handler.
pub(super) fn validate_declared_tools(declared: &[String]) -> Result<(), String> {
    let unknown: Vec<&str> = declared
        .iter()
        .map(String::as_str)
        .filter(|name| !BUILTIN_TOOL_NAMES.contains(name))
        .collect();

    if !unknown.is_empty() {
        return Err(format!(
            "Unknown declared tools: {}. Available tools: {}",
            unknown.join(", "),
            BUILTIN_TOOL_NAMES.join(", ")
        ));
    }
    Ok(())
}

pub(super) fn validate_rate_limit(requests_per_second: u32, burst: u32) -> Result<(), String> {
    if requests_per_second == 0 || burst == 0 {
        return Err(
            "RATE_LIMIT_REQUESTS_PER_SECOND and RATE_LIMIT_BURST_SIZE must be greater than 0"
                .to_string(),
        );
    }
    Ok(())
}

/// Combine TLS paths into a [`TlsConfig`].
///
/// Both paths must be given together and both files must exist.
pub(super) fn resolve_tls(
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
) -> Result<Option<TlsConfig>, String> {
    match (cert_path, key_path) {
        (None, None) => Ok(None),
        (Some(cert_path), Some(key_path)) => {
            if !cert_path.exists() {
                return Err(format!(
                    "TLS certificate file not found: {}",
                    cert_path.display()
                ));
            }
            if !key_path.exists() {
                return Err(format!("TLS key file not found: {}", key_path.display()));
            }
            Ok(Some(TlsConfig {
                cert_path,
                key_path,
            }))
        }
        _ => Err(
            "TLS configuration requires both TLS_CERT_PATH and TLS_KEY_PATH to be set"
                .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_openai_api_key() {
        assert!(validate_openai_api_key("sk-test").is_ok());
        assert!(validate_openai_api_key("").is_err());
        assert!(validate_openai_api_key("   ").is_err());
    }

    #[test]
    fn test_validate_temperature() {
        assert!(validate_temperature(0.0).is_ok());
        assert!(validate_temperature(0.8).is_ok());
        assert!(validate_temperature(2.0).is_ok());
        assert!(validate_temperature(-0.1).is_err());
        assert!(validate_temperature(2.5).is_err());
        assert!(validate_temperature(f32::NAN).is_err());
    }

    #[test]
    fn test_validate_declared_tools() {
        let declared = vec!["scheduleCallback".to_string(), "addToDNC".to_string()];
        assert!(validate_declared_tools(&declared).is_ok());
        assert!(validate_declared_tools(&[]).is_ok());

        let declared = vec!["addToDNC".to_string(), "orderPizza".to_string()];
        let err = validate_declared_tools(&declared).unwrap_err();
        assert!(err.starts_with("Unknown declared tools: orderPizza."));
    }

    #[test]
    fn test_validate_rate_limit() {
        assert!(validate_rate_limit(60, 10).is_ok());
        assert!(validate_rate_limit(0, 10).is_err());
        assert!(validate_rate_limit(60, 0).is_err());
    }

    #[test]
    fn test_resolve_tls() {
        assert!(resolve_tls(None, None).unwrap().is_none());

        let result = resolve_tls(Some(PathBuf::from("/tmp/cert.pem")), None);
        assert!(result.unwrap_err().contains("both"));

        let temp_dir = TempDir::new().unwrap();
        let cert = temp_dir.path().join("cert.pem");
        let key = temp_dir.path().join("key.pem");
        fs::write(&cert, "cert").unwrap();

        let err = resolve_tls(Some(cert.clone()), Some(key.clone())).unwrap_err();
        assert!(err.contains("key file not found"));

        fs::write(&key, "key").unwrap();
        let tls = resolve_tls(Some(cert.clone()), Some(key)).unwrap().unwrap();
        assert_eq!(tls.cert_path, cert);
    }
}
