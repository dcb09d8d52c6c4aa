//! Distributed tracing: OpenTelemetry setup, the HTTP tracing middleware and
//! span helpers.
//!
//! ```rust,ignore
//! use tracelog::config::Config;
//! use tracelog::middleware::MiddlewareChain;
//! use tracelog::observability::Telemetry;
//!
//! let config = Config::from_env()?;
//! let telemetry = Telemetry::init(&config)?;
//! let chain = MiddlewareChain::new().add(telemetry.middleware());
//!
//! // ... serve requests through `chain` ...
//!
//! telemetry.shutdown()?;
//! ```

mod exception;
mod otel;
mod tracing_middleware;

pub use exception::record_exception;
pub use otel::{install_propagator, propagator, Telemetry, TelemetryError};
pub use tracing_middleware::{
    extract_context, trace_scope, TracingMiddleware, SPAN_ID_HEADER, TRACE_ID_HEADER,
};
