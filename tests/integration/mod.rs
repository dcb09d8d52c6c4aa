//! Integration tests for tracelog
//!
//! These run in-process: requests go through a `MiddlewareChain` built from
//! `Telemetry` with OTLP export disabled, and log output is captured from a
//! shared buffer.

mod helpers;

mod logging_flow;
mod tracing_flow;
