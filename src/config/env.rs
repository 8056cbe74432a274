//! Environment variable loading.

use std::env;
use std::str::FromStr;

/// Read a variable, treating empty or whitespace-only values as unset.
pub(super) fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset.
pub(super) fn env_parse<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| format!("Invalid value for {name} '{raw}': {e}")),
        None => Ok(default),
    }
}

/// Read a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub(super) fn env_bool(name: &str, default: bool) -> Result<bool, String> {
    match env_var(name) {
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| format!("Invalid value for {name} '{raw}': expected a boolean")),
        None => Ok(default),
    }
}

/// Read a comma-separated list, dropping empty entries.
pub(super) fn env_list(name: &str) -> Option<Vec<String>> {
    env_var(name).map(|raw| split_list(&raw))
}

pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(super) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
