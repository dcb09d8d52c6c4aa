//! Environment variable parsing utilities.
//!
//! Every helper reads through a [`Vars`] source so loading can be exercised
//! without touching the process environment.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Source of configuration variables.
pub trait Vars {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl Vars for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Vars for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Vars for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Get variable with default value.
pub fn env_or(vars: &dyn Vars, key: &str, default: &str) -> String {
    vars.var(key).unwrap_or_else(|| default.to_string())
}

/// Get optional variable (None if empty or missing).
pub fn env_opt(vars: &dyn Vars, key: &str) -> Option<String> {
    vars.var(key).filter(|s| !s.is_empty())
}

/// Parse variable as boolean.
/// Treats "1", "true" (case-insensitive) as true.
pub fn env_bool(vars: &dyn Vars, key: &str, default: bool) -> bool {
    vars.var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Parse variable with type conversion.
pub fn env_parse<T: FromStr>(vars: &dyn Vars, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars.var(key) {
        Some(v) if !v.is_empty() => v.parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        _ => Ok(default),
    }
}

/// Parse duration string (e.g., "500ms", "30s", "2m", "1h").
/// Returns None for "off" or "0".
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_lowercase();

    if s == "off" || s == "0" || s.is_empty() {
        return Ok(None);
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = s.strip_suffix('h') {
        (num, "h")
    } else {
        // Bare number: seconds
        return s
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| format!("invalid duration: {}", s));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let secs = match unit {
        "ms" => return Ok(Some(Duration::from_millis(num))),
        "s" => Some(num),
        "m" => num.checked_mul(60),
        _ => num.checked_mul(3600),
    };

    secs.map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| format!("duration too large: {}", s))
}

/// Parse variable as duration. "off" and "0" fall back to `default`.
pub fn env_duration(
    vars: &dyn Vars,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = env_opt(vars, key) else {
        return Ok(default);
    };
    parse_duration(&value)
        .map(|d| d.unwrap_or(default))
        .map_err(|e| ConfigError::Parse {
            key: key.into(),
            value,
            error: e,
        })
}
