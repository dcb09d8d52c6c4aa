//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracelog::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("OTLP endpoint: {}", config.otel.endpoint);
//! ```

mod error;
mod logging;
mod otel;
mod parse;
mod server;

pub use error::ConfigError;
pub use logging::LoggingConfig;
pub use otel::OtelConfig;
pub use parse::{parse_duration, ProcessEnv, Vars};
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Demo server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// OpenTelemetry export configuration.
    pub otel: OtelConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&ProcessEnv)
    }

    /// Load configuration from any variable source.
    pub fn from_vars(vars: &dyn Vars) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_vars(vars)?,
            logging: LoggingConfig::from_vars(vars)?,
            otel: OtelConfig::from_vars(vars)?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Service: {} {}", self.otel.service_name, self.otel.service_version);
        info!("  Log level: {}", self.logging.level);

        if self.otel.is_enabled() {
            info!("  OTLP endpoint: {}", self.otel.endpoint);
            info!("  OTLP export timeout: {:?}", self.otel.export_timeout);
            info!(
                "  OTLP logs: {}",
                if self.otel.logs_enabled { "enabled" } else { "disabled" }
            );
        } else {
            info!("  OTLP export: disabled");
        }
    }
}
