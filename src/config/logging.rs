//! Logging configuration.

use super::parse::{env_opt, env_or, Vars};
use super::ConfigError;
use crate::logging::Level;

const DEFAULT_SERVICE: &str = "tracelog";

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Minimum level for the structured log sink (LOG_LEVEL).
    pub level: Level,
    /// Filter for the crate's own diagnostics (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name stamped on diagnostic lines.
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            filter: format!("{}=info", DEFAULT_SERVICE),
            service_name: DEFAULT_SERVICE.into(),
        }
    }
}

impl LoggingConfig {
    /// Load configuration from variables.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default
    ///
    /// LOG_LEVEL accepts simple values: debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: tracelog=debug,hyper=warn
    pub fn from_vars(vars: &dyn Vars) -> Result<Self, ConfigError> {
        let level = match env_opt(vars, "LOG_LEVEL") {
            Some(raw) => match raw.parse::<Level>() {
                Ok(level) => Some(level),
                Err(e) => {
                    // Fall through to RUST_LOG
                    eprintln!(
                        "Warning: LOG_LEVEL '{}' ({}): {}",
                        raw,
                        Level::name_of(&raw),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let filter = match (level, env_opt(vars, "RUST_LOG")) {
            (Some(level), _) => format!("{}={}", DEFAULT_SERVICE, level.as_str().to_lowercase()),
            (None, Some(filter)) => filter,
            (None, None) => format!("{}=info", DEFAULT_SERVICE),
        };

        Ok(Self {
            level: level.unwrap_or_default(),
            filter,
            service_name: env_or(vars, "SERVICE_NAME", DEFAULT_SERVICE),
        })
    }
}
