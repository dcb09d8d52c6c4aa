//! OpenTelemetry setup: tracer provider, logger provider and the shared
//! [`Logger`].
//!
//! Export goes over OTLP/HTTP to `<endpoint>/v1/traces` and `<endpoint>/v1/logs`
//! when `OTEL_ENABLED` is set. Without it the tracer provider is still built
//! so spans get real ids for log correlation; nothing leaves the process.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracelog::config::Config;
//! use tracelog::observability::Telemetry;
//!
//! let config = Config::from_env()?;
//! let telemetry = Telemetry::init(&config)?;
//!
//! // ... run server ...
//!
//! telemetry.shutdown()?;
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Config as TraceConfig, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing::info;

use super::TracingMiddleware;
use crate::config::{Config, OtelConfig};
use crate::logging::{Logger, OtelLogSink};

/// Errors from building or tearing down the telemetry pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to build trace exporter: {0}")]
    TraceExporter(#[from] opentelemetry::trace::TraceError),

    #[error("failed to build log exporter: {0}")]
    LogExporter(#[from] opentelemetry_sdk::logs::LogError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("telemetry shutdown failed: {0}")]
    Shutdown(String),
}

/// W3C TraceContext + Baggage.
pub fn propagator() -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ])
}

/// Install [`propagator`] as the global text-map propagator, for outbound
/// clients that inject through `opentelemetry::global`.
pub fn install_propagator() {
    global::set_text_map_propagator(propagator());
}

/// Process-wide telemetry handle.
///
/// Build once at startup; hand out [`tracer`](Self::tracer) and
/// [`logger`](Self::logger) to the components that need them.
pub struct Telemetry {
    tracer_provider: TracerProvider,
    logger_provider: Option<LoggerProvider>,
    tracer: Tracer,
    logger: Arc<Logger>,
}

impl Telemetry {
    /// Build telemetry with the local log sink on stdout.
    pub fn init(config: &Config) -> Result<Self, TelemetryError> {
        Self::init_with_writer(config, io::stdout())
    }

    /// Build telemetry with the local log sink on `writer`.
    ///
    /// With export enabled this must run inside a tokio runtime: the batch
    /// processors spawn their workers on it.
    pub fn init_with_writer<W: Write + Send + 'static>(
        config: &Config,
        writer: W,
    ) -> Result<Self, TelemetryError> {
        let otel = &config.otel;
        let resource = Resource::new([
            KeyValue::new(SERVICE_NAME, otel.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, otel.service_version.clone()),
        ]);

        let tracer_provider = build_tracer_provider(otel, resource.clone())?;
        let tracer = tracer_provider.tracer(otel.service_name.clone());

        let mut logger = Logger::with_writer(writer, config.logging.level);
        let logger_provider = if otel.exports_logs() {
            let provider = build_logger_provider(otel, resource)?;
            logger = logger.with_remote(Arc::new(OtelLogSink::new(
                &provider,
                otel.service_name.clone(),
            )));
            Some(provider)
        } else {
            None
        };

        install_propagator();
        global::set_tracer_provider(tracer_provider.clone());

        if otel.is_enabled() {
            info!(
                endpoint = %otel.endpoint,
                service = %otel.service_name,
                version = %otel.service_version,
                logs = otel.exports_logs(),
                "OpenTelemetry export initialized"
            );
        } else {
            info!("OpenTelemetry export disabled (OTEL_ENABLED != 1)");
        }

        Ok(Self {
            tracer_provider,
            logger_provider,
            tracer,
            logger: Arc::new(logger),
        })
    }

    /// Tracer named after the service.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Shared structured logger.
    pub fn logger(&self) -> Arc<Logger> {
        self.logger.clone()
    }

    /// Tracing middleware wired to this handle.
    pub fn middleware(&self) -> TracingMiddleware {
        TracingMiddleware::new(self.tracer.clone(), self.logger.clone())
    }

    /// Flush pending spans and records and stop the exporters.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        let mut failures = Vec::new();

        if let Err(e) = self.tracer_provider.shutdown() {
            failures.push(format!("traces: {}", e));
        }
        if let Some(provider) = &self.logger_provider {
            if let Err(e) = provider.shutdown() {
                failures.push(format!("logs: {}", e));
            }
        }

        if failures.is_empty() {
            info!("OpenTelemetry shutdown complete");
            Ok(())
        } else {
            Err(TelemetryError::Shutdown(failures.join("; ")))
        }
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("logger", &self.logger)
            .field("exports_logs", &self.logger_provider.is_some())
            .finish_non_exhaustive()
    }
}

fn build_tracer_provider(
    config: &OtelConfig,
    resource: Resource,
) -> Result<TracerProvider, TelemetryError> {
    let mut builder = TracerProvider::builder().with_config(
        TraceConfig::default()
            .with_resource(resource)
            .with_sampler(Sampler::AlwaysOn),
    );

    if config.is_enabled() {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(config.traces_endpoint())
            .with_timeout(config.export_timeout)
            .build()?;
        builder = builder.with_batch_exporter(exporter, runtime::Tokio);
    }

    Ok(builder.build())
}

fn build_logger_provider(
    config: &OtelConfig,
    resource: Resource,
) -> Result<LoggerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .with_endpoint(config.logs_endpoint())
        .with_timeout(config.export_timeout)
        .build()?;

    Ok(LoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build())
}
