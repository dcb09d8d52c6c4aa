//! OpenTelemetry export configuration.

use std::time::Duration;

use super::parse::{env_bool, env_duration, env_or, Vars};
use super::ConfigError;

/// OpenTelemetry configuration.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    /// Whether OTLP export is enabled.
    pub enabled: bool,
    /// OTLP/HTTP collector base URL (e.g., "http://collector:4318").
    pub endpoint: String,
    /// Service name, also used for the tracer and logger.
    pub service_name: String,
    /// Service version resource attribute.
    pub service_version: String,
    /// Trace export timeout.
    pub export_timeout: Duration,
    /// Export log records when OTLP is enabled.
    pub logs_enabled: bool,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:4318".into(),
            service_name: "tracelog".into(),
            service_version: "0.1.0".into(),
            export_timeout: Duration::from_millis(500),
            logs_enabled: true,
        }
    }
}

impl OtelConfig {
    /// Load configuration from variables.
    pub fn from_vars(vars: &dyn Vars) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let endpoint = env_or(vars, "OTEL_EXPORTER_OTLP_ENDPOINT", &defaults.endpoint);
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "OTEL_EXPORTER_OTLP_ENDPOINT".into(),
                message: format!("'{}' is not an http(s) URL", endpoint),
            });
        }

        Ok(Self {
            enabled: env_bool(vars, "OTEL_ENABLED", false),
            endpoint,
            service_name: env_or(vars, "SERVICE_NAME", &defaults.service_name),
            service_version: env_or(vars, "SERVICE_VERSION", &defaults.service_version),
            export_timeout: env_duration(vars, "OTEL_EXPORT_TIMEOUT", defaults.export_timeout)?,
            logs_enabled: env_bool(vars, "OTEL_LOGS_ENABLED", true),
        })
    }

    /// Check if OpenTelemetry export is enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if log records are exported.
    #[inline]
    pub fn exports_logs(&self) -> bool {
        self.enabled && self.logs_enabled
    }

    /// Full URL of the trace export endpoint.
    pub fn traces_endpoint(&self) -> String {
        format!("{}/v1/traces", self.endpoint.trim_end_matches('/'))
    }

    /// Full URL of the log export endpoint.
    pub fn logs_endpoint(&self) -> String {
        format!("{}/v1/logs", self.endpoint.trim_end_matches('/'))
    }
}
