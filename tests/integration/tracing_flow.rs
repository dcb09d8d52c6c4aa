//! Request tracing through the middleware chain: response headers, inbound
//! propagation and log correlation.

use crate::helpers::*;
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracelog::core::{Context, Error, Response};
use tracelog::middleware::MiddlewareChain;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracelog::observability::{trace_scope, SPAN_ID_HEADER, TRACE_ID_HEADER};
use tracelog::{Level, Logger, Tags, TracingMiddleware};

const INBOUND_TRACE: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const INBOUND_SPAN: &str = "00f067aa0ba902b7";

/// A request without trace headers gets a fresh trace
#[test]
fn test_new_trace_headers() {
    let (telemetry, _buf) = telemetry();
    let chain = MiddlewareChain::new().add(telemetry.middleware());

    let mut ctx = Context::default();
    let res = chain.process(get("/hello", &[]), &mut ctx, |_req, _ctx| Response::ok("hi"));

    assert_eq!(res.status(), StatusCode::OK);
    let trace_id = assert_hex_header(&res, TRACE_ID_HEADER, 32);
    assert_hex_header(&res, SPAN_ID_HEADER, 16);
    assert_ne!(trace_id, "0".repeat(32));
}

/// Independent requests do not share a trace
#[test]
fn test_requests_get_distinct_traces() {
    let (telemetry, _buf) = telemetry();
    let chain = MiddlewareChain::new().add(telemetry.middleware());

    let first = chain.process(get("/a", &[]), &mut Context::default(), |_req, _ctx| {
        Response::ok("a")
    });
    let second = chain.process(get("/b", &[]), &mut Context::default(), |_req, _ctx| {
        Response::ok("b")
    });

    assert_ne!(first.header(TRACE_ID_HEADER), second.header(TRACE_ID_HEADER));
}

/// A middleware built straight from an SDK provider, default sampler included
#[test]
fn test_standalone_middleware() {
    let provider = TracerProvider::builder().build();
    let buf = SharedBuf::default();
    let logger = Arc::new(Logger::with_writer(buf.clone(), Level::Info));
    let middleware = TracingMiddleware::new(provider.tracer("standalone"), logger);
    let chain = MiddlewareChain::new().add(middleware);
    let traceparent = format!("00-{}-{}-01", INBOUND_TRACE, INBOUND_SPAN);

    let fresh = chain.process(get("/", &[]), &mut Context::default(), |_req, _ctx| {
        Response::ok("ok")
    });
    let trace_id = assert_hex_header(&fresh, TRACE_ID_HEADER, 32);
    assert_ne!(trace_id, "0".repeat(32));

    let continued = chain.process(
        get("/orders", &[("traceparent", &traceparent)]),
        &mut Context::default(),
        |_req, _ctx| Response::ok("[]"),
    );
    assert_eq!(continued.header(TRACE_ID_HEADER), Some(INBOUND_TRACE));

    let line = buf.find("URL: /orders").expect("request line logged");
    assert_eq!(line["trace_id"], json!(INBOUND_TRACE));
}

/// An inbound traceparent continues the caller's trace
#[test]
fn test_inbound_traceparent_continues_trace() {
    let (telemetry, _buf) = telemetry();
    let chain = MiddlewareChain::new().add(telemetry.middleware());
    let traceparent = format!("00-{}-{}-01", INBOUND_TRACE, INBOUND_SPAN);

    let mut ctx = Context::default();
    let res = chain.process(
        get("/orders", &[("traceparent", &traceparent)]),
        &mut ctx,
        |_req, _ctx| Response::ok("[]"),
    );

    assert_eq!(res.header(TRACE_ID_HEADER), Some(INBOUND_TRACE));
    let span_id = assert_hex_header(&res, SPAN_ID_HEADER, 16);
    assert_ne!(span_id, INBOUND_SPAN, "server span must be a child, not the caller's span");
}

/// A malformed traceparent is ignored and a new trace starts
#[test]
fn test_malformed_traceparent_starts_new_trace() {
    let (telemetry, _buf) = telemetry();
    let chain = MiddlewareChain::new().add(telemetry.middleware());

    let res = chain.process(
        get("/", &[("traceparent", "00-not-a-trace-01")]),
        &mut Context::default(),
        |_req, _ctx| Response::ok("ok"),
    );

    let trace_id = assert_hex_header(&res, TRACE_ID_HEADER, 32);
    assert_ne!(trace_id, INBOUND_TRACE);
}

/// The request line is logged with the span's identity
#[test]
fn test_request_log_line_carries_trace_ids() {
    let (telemetry, buf) = telemetry();
    let chain = MiddlewareChain::new().add(telemetry.middleware());

    let res = chain.process(get("/search?q=rust", &[]), &mut Context::default(), |_req, _ctx| {
        Response::ok("results")
    });

    let line = buf.find("URL: /search?q=rust").expect("request line logged");
    assert_eq!(line["level"], json!("INFO"));
    assert_eq!(line["trace_id"].as_str(), res.header(TRACE_ID_HEADER));
    assert_eq!(line["span_id"].as_str(), res.header(SPAN_ID_HEADER));
}

/// Handler logs through the request scope share the request's trace
#[test]
fn test_handler_logs_are_correlated() {
    let (telemetry, buf) = telemetry();
    let logger = telemetry.logger();
    let chain = MiddlewareChain::new().add(telemetry.middleware());

    let res = chain.process(get("/checkout", &[]), &mut Context::default(), |_req, ctx| {
        let scope = trace_scope(ctx).with_tag("user", "alice");
        logger.log(
            &scope,
            Level::Info,
            Some(&Tags::new().with("items", 3)),
            format_args!("checkout complete"),
        );
        Response::ok("done")
    });

    let line = buf.find("checkout complete").expect("handler line logged");
    assert_eq!(line["user"], json!("alice"));
    assert_eq!(line["items"], json!(3));
    assert_eq!(line["trace_id"].as_str(), res.header(TRACE_ID_HEADER));
}

/// Handler errors are returned unchanged and the trace headers stay available
#[tokio::test]
async fn test_handler_error_passthrough() {
    let (telemetry, buf) = telemetry();
    let logger = telemetry.logger();
    let chain = MiddlewareChain::new().add(telemetry.middleware());

    let mut ctx = Context::default();
    let result = chain
        .try_process_async(get("/fail", &[]), &mut ctx, |_req, _ctx| async {
            Err::<Response, _>(Error::from("database unavailable"))
        })
        .await;

    let err = result.expect_err("handler error is returned");
    assert_eq!(err.to_string(), "database unavailable");

    let trace_id = ctx
        .response_headers()
        .get(TRACE_ID_HEADER)
        .cloned()
        .expect("trace header recorded on the context");

    logger.log_error(&trace_scope(&ctx), &err, &[]);
    let line = buf.find("database unavailable").expect("error logged");
    assert_eq!(line["level"], json!("ERROR"));
    assert_eq!(line["error"], json!(true));
    assert_eq!(line["trace_id"], json!(trace_id));
}

/// Without the tracing middleware, handler scopes carry no trace identity
#[test]
fn test_untraced_chain() {
    let (telemetry, buf) = telemetry();
    let logger = telemetry.logger();
    let chain = MiddlewareChain::new();

    let res = chain.process(get("/", &[]), &mut Context::default(), |_req, ctx| {
        logger.info(&trace_scope(ctx), "untraced");
        Response::ok("ok")
    });

    assert!(res.header(TRACE_ID_HEADER).is_none());
    let line = buf.find("untraced").expect("line logged");
    assert!(line.get("trace_id").is_none());
}
