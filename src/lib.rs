//! tracelog - trace-correlated structured logging, timing and HTTP tracing
//! helpers on top of OpenTelemetry.
//!
//! # Features
//!
//! - **Request scopes**: immutable context carrying tags and trace identity
//! - **Structured logging**: JSON lines with `trace_id`/`span_id`, mirrored to
//!   an OTLP log exporter when enabled
//! - **Tracing middleware**: W3C trace context propagation, server spans and
//!   `X-Trace-ID` / `X-Span-ID` response headers
//! - **Timing**: closures, scopes and futures
//!
//! # Example
//!
//! ```rust,ignore
//! use tracelog::config::Config;
//! use tracelog::core::{Context, Response};
//! use tracelog::middleware::MiddlewareChain;
//! use tracelog::observability::{trace_scope, Telemetry};
//!
//! let config = Config::from_env()?;
//! let telemetry = Telemetry::init(&config)?;
//! let logger = telemetry.logger();
//! let chain = MiddlewareChain::new().add(telemetry.middleware());
//!
//! let res = chain.process(req, &mut Context::default(), |_req, ctx| {
//!     let scope = trace_scope(ctx).with_tag("user", "alice");
//!     logger.info(&scope, "handled");
//!     Response::ok("hello")
//! });
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod core;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod scope;
pub mod tags;
pub mod timer;
pub mod trace_context;

// Re-exports for convenience
pub use config::Config;
pub use logging::{Level, LogRecord, Logger, RemoteSink};
pub use observability::{Telemetry, TelemetryError, TracingMiddleware};
pub use scope::Scope;
pub use tags::Tags;
pub use trace_context::{recover_span_context, set_trace_context, TraceInfo};
