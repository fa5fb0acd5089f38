use std::env;
use std::str::FromStr;

/// Read an environment variable, treating empty or whitespace-only values as unset
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable into `T`, naming the variable in the error
pub(super) fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})")),
        None => Ok(None),
    }
}

/// Parse a boolean environment variable
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off` in any case.
pub(super) fn env_bool(name: &str) -> Result<Option<bool>, String> {
    match env_string(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid boolean for {name}: '{raw}'")),
        None => Ok(None),
    }
}

/// Split a comma-separated environment variable into trimmed, non-empty items
pub(super) fn env_list(name: &str) -> Option<Vec<String>> {
    env_string(name).map(|raw| split_list(&raw))
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
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
