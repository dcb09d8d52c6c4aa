//! Request tracing middleware.
//!
//! For each request the middleware derives a [`Scope`] carrying the request's
//! trace identity, starts a server span unless a live one is already in
//! scope, echoes the ids back as `X-Trace-ID` / `X-Span-ID`, and leaves the
//! scope in the request [`Context`] for handlers ([`trace_scope`]).

use std::sync::Arc;

use http::HeaderMap;
use opentelemetry::{
    propagation::{Extractor, TextMapCompositePropagator, TextMapPropagator},
    trace::{SpanKind, Status, TraceContextExt, TraceId, Tracer as _},
    KeyValue,
};
use opentelemetry_sdk::trace::Tracer;

use super::{propagator, record_exception};
use crate::core::{Context, Request, Response};
use crate::log_event;
use crate::logging::{Level, Logger};
use crate::middleware::{Middleware, MiddlewareResult};
use crate::scope::Scope;
use crate::trace_context::{recover_span_context, set_trace_context};

/// Response header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "X-Trace-ID";

/// Response header carrying the span id.
pub const SPAN_ID_HEADER: &str = "X-Span-ID";

const TRACE_KEY: &str = "tracelog.trace";

/// Per-request tracing state kept in the [`Context`].
struct RequestTrace {
    scope: Scope,
    /// Whether this middleware started the span and must end it.
    owned: bool,
}

/// Extract inbound trace context (`traceparent`, `baggage`) from headers,
/// on top of the current context.
pub fn extract_context(
    propagator: &dyn TextMapPropagator,
    headers: &HeaderMap,
) -> opentelemetry::Context {
    propagator.extract(&HeaderExtractor(headers))
}

/// The request scope left by [`TracingMiddleware`]; empty when the request
/// was not traced.
pub fn trace_scope(ctx: &Context) -> Scope {
    ctx.get::<RequestTrace>(TRACE_KEY)
        .map(|trace| trace.scope.clone())
        .unwrap_or_default()
}

/// Middleware starting or reusing a server span per request.
///
/// Inbound context is read with its own W3C propagator, so the process-wide
/// one does not have to be installed.
pub struct TracingMiddleware {
    tracer: Tracer,
    logger: Arc<Logger>,
    propagator: TextMapCompositePropagator,
}

impl TracingMiddleware {
    pub fn new(tracer: Tracer, logger: Arc<Logger>) -> Self {
        Self {
            tracer,
            logger,
            propagator: propagator(),
        }
    }

    /// Derive the request's otel context: reuse a recording span already in
    /// scope, otherwise start a server span under it.
    fn span_context(
        &self,
        req: &Request,
        cx: opentelemetry::Context,
    ) -> (opentelemetry::Context, bool) {
        let reuse = {
            let span = cx.span();
            span.span_context().is_valid() && span.is_recording()
        };
        if reuse {
            return (cx, false);
        }

        let span = self
            .tracer
            .span_builder(req.path().to_string())
            .with_kind(SpanKind::Server)
            .with_attributes(vec![
                KeyValue::new("custom", "yes"),
                KeyValue::new("http.method", req.method().to_string()),
                KeyValue::new("http.url", req.original_url().to_string()),
            ])
            .start_with_context(&self.tracer, &cx);

        (cx.with_span(span), true)
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        -40
    }

    fn on_request(&self, req: Request, ctx: &mut Context) -> MiddlewareResult {
        let inbound = extract_context(&self.propagator, req.headers());
        let inbound = Scope::new().with_otel_context(inbound);
        let scope = recover_span_context(&set_trace_context(&inbound));
        let cx = scope.otel_context().cloned().unwrap_or_default();

        let (cx, owned) = self.span_context(&req, cx);

        {
            let span = cx.span();

            let pairs = req.query_pairs();
            for (key, value) in &pairs {
                span.set_attribute(KeyValue::new(format!("http.query.{}", key), value.clone()));
            }
            span.set_attribute(KeyValue::new("http.query.items", pairs.len() as i64));

            let span_context = span.span_context();
            if span_context.trace_id() != TraceId::INVALID {
                tracing::debug!(trace_id = %span_context.trace_id(), owned, "request traced");
                ctx.set_response_header(TRACE_ID_HEADER, span_context.trace_id());
                ctx.set_response_header(SPAN_ID_HEADER, span_context.span_id());
            }
        }

        let scope = set_trace_context(&scope.with_otel_context(cx));
        log_event!(self.logger, &scope, Level::Info, "URL: {}", req.original_url());

        ctx.set(TRACE_KEY, RequestTrace { scope, owned });
        MiddlewareResult::Next(req)
    }

    fn on_response(&self, res: Response, ctx: &Context) -> Response {
        let Some(trace) = ctx.get::<RequestTrace>(TRACE_KEY) else {
            return res;
        };
        let Some(cx) = trace.scope.otel_context() else {
            return res;
        };

        let span = cx.span();
        let status = res.status().as_u16();
        span.set_attribute(KeyValue::new("http.status_code", i64::from(status)));
        if res.is_server_error() {
            span.set_status(Status::error(format!("HTTP {}", status)));
        }
        if trace.owned {
            span.end();
        }
        res
    }

    fn on_error(&self, err: &(dyn std::error::Error + 'static), ctx: &Context) {
        let Some(trace) = ctx.get::<RequestTrace>(TRACE_KEY) else {
            return;
        };
        let Some(cx) = trace.scope.otel_context() else {
            return;
        };

        let span = cx.span();
        record_exception(&span, "handler_error", err, Vec::new());
        if trace.owned {
            span.end();
        }
    }
}

// Header extractor for OpenTelemetry propagation
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace_context::{SPAN_ID_HEX_LEN, TRACE_ID_HEX_LEN};
    use opentelemetry::trace::noop::NoopTextMapPropagator;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry::Value;
    use opentelemetry_sdk::export::trace::SpanData;
    use opentelemetry_sdk::testing::trace::{InMemorySpanExporter, InMemorySpanExporterBuilder};
    use opentelemetry_sdk::trace::{Config, Sampler, TracerProvider};

    const TRACE: &str = "0af7651916cd43dd8448eb211c80319c";
    const PARENT_SPAN: &str = "b7ad6b7169203331";

    struct Harness {
        middleware: TracingMiddleware,
        exporter: InMemorySpanExporter,
        tracer: Tracer,
        _provider: TracerProvider,
    }

    fn harness() -> Harness {
        // Same sampler as Telemetry: remote parents arrive unsampled.
        harness_with(Some(Sampler::AlwaysOn))
    }

    /// `None` keeps the SDK default sampler (parent based, root always on).
    fn harness_with(sampler: Option<Sampler>) -> Harness {
        let exporter = InMemorySpanExporterBuilder::new().build();
        let mut builder = TracerProvider::builder().with_simple_exporter(exporter.clone());
        if let Some(sampler) = sampler {
            builder = builder.with_config(Config::default().with_sampler(sampler));
        }
        let provider = builder.build();
        let tracer = provider.tracer("test");
        let logger = Arc::new(Logger::with_writer(std::io::sink(), Level::Info));
        Harness {
            middleware: TracingMiddleware::new(tracer.clone(), logger),
            exporter,
            tracer,
            _provider: provider,
        }
    }

    fn request(uri: &str, traceparent: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method("GET").uri(uri);
        if let Some(tp) = traceparent {
            builder = builder.header("traceparent", tp);
        }
        builder.body(bytes::Bytes::new()).unwrap().into()
    }

    fn run(h: &Harness, req: Request, status: http::StatusCode) -> (Context, Response) {
        let mut ctx = Context::default();
        assert!(h.middleware.on_request(req, &mut ctx).is_next());
        let res = h.middleware.on_response(Response::empty(status), &ctx);
        (ctx, res)
    }

    fn attr(span: &SpanData, key: &str) -> Option<Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    #[test]
    fn test_no_inbound_context_starts_trace() {
        let h = harness();
        let (ctx, _) = run(&h, request("/orders", None), http::StatusCode::OK);

        let headers = ctx.response_headers();
        let trace_id = &headers[TRACE_ID_HEADER];
        let span_id = &headers[SPAN_ID_HEADER];
        assert_eq!(trace_id.len(), TRACE_ID_HEX_LEN);
        assert_eq!(span_id.len(), SPAN_ID_HEX_LEN);
        assert_ne!(trace_id.as_str(), "0".repeat(TRACE_ID_HEX_LEN));

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "/orders");
        assert_eq!(spans[0].span_kind, SpanKind::Server);
        assert_eq!(spans[0].span_context.trace_id().to_string(), *trace_id);
        assert_eq!(attr(&spans[0], "custom"), Some(Value::from("yes")));
        assert_eq!(attr(&spans[0], "http.method"), Some(Value::from("GET")));
        assert_eq!(attr(&spans[0], "http.status_code"), Some(Value::I64(200)));
    }

    #[test]
    fn test_default_sampler_no_inbound_context() {
        let h = harness_with(None);
        let (ctx, _) = run(&h, request("/orders", None), http::StatusCode::OK);

        let trace_id = &ctx.response_headers()[TRACE_ID_HEADER];
        assert_eq!(trace_id.len(), TRACE_ID_HEX_LEN);
        assert_ne!(trace_id.as_str(), "0".repeat(TRACE_ID_HEX_LEN));

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].span_context.trace_id().to_string(), *trace_id);
    }

    #[test]
    fn test_default_sampler_sampled_parent() {
        let h = harness_with(None);
        let traceparent = format!("00-{}-{}-01", TRACE, PARENT_SPAN);
        let (ctx, _) = run(&h, request("/pay", Some(&traceparent)), http::StatusCode::OK);

        assert_eq!(ctx.response_headers()[TRACE_ID_HEADER], TRACE);
        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].parent_span_id.to_string(), PARENT_SPAN);
    }

    #[test]
    fn test_default_sampler_unsampled_parent_keeps_ids() {
        let h = harness_with(None);
        let traceparent = format!("00-{}-{}-00", TRACE, PARENT_SPAN);
        let (ctx, _) = run(&h, request("/pay", Some(&traceparent)), http::StatusCode::OK);

        // Dropped by the sampler, but the ids still correlate.
        let headers = ctx.response_headers();
        assert_eq!(headers[TRACE_ID_HEADER], TRACE);
        assert_eq!(headers[SPAN_ID_HEADER].len(), SPAN_ID_HEX_LEN);
        assert_ne!(headers[SPAN_ID_HEADER], PARENT_SPAN);
        assert!(h.exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn test_inbound_context_without_global_propagator() {
        opentelemetry::global::set_text_map_propagator(NoopTextMapPropagator::new());

        let h = harness();
        let traceparent = format!("00-{}-{}-01", TRACE, PARENT_SPAN);
        let (ctx, _) = run(&h, request("/pay", Some(&traceparent)), http::StatusCode::OK);

        assert_eq!(ctx.response_headers()[TRACE_ID_HEADER], TRACE);
    }

    #[test]
    fn test_extract_context() {
        let mut headers = HeaderMap::new();
        let traceparent = format!("00-{}-{}-01", TRACE, PARENT_SPAN);
        headers.insert("traceparent", traceparent.parse().unwrap());

        let cx = extract_context(&propagator(), &headers);
        let span = cx.span();
        assert!(span.span_context().is_remote());
        assert_eq!(span.span_context().trace_id().to_string(), TRACE);

        let cx = extract_context(&propagator(), &HeaderMap::new());
        assert!(!cx.span().span_context().is_valid());
    }

    #[test]
    fn test_inbound_context_keeps_trace_id() {
        let h = harness();
        let traceparent = format!("00-{}-{}-01", TRACE, PARENT_SPAN);
        let (ctx, _) = run(&h, request("/pay", Some(&traceparent)), http::StatusCode::OK);

        let headers = ctx.response_headers();
        assert_eq!(headers[TRACE_ID_HEADER], TRACE);
        assert_ne!(headers[SPAN_ID_HEADER], PARENT_SPAN);

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].parent_span_id.to_string(), PARENT_SPAN);
    }

    #[test]
    fn test_malformed_traceparent_starts_new_trace() {
        let h = harness();
        let (ctx, _) = run(
            &h,
            request("/pay", Some("00-not-a-trace-01")),
            http::StatusCode::OK,
        );

        let trace_id = &ctx.response_headers()[TRACE_ID_HEADER];
        assert_eq!(trace_id.len(), TRACE_ID_HEX_LEN);
        assert_ne!(trace_id.as_str(), TRACE);
    }

    #[test]
    fn test_query_attributes() {
        let h = harness();
        run(
            &h,
            request("/search?q=red+shoes&page=2", None),
            http::StatusCode::OK,
        );

        let spans = h.exporter.get_finished_spans().unwrap();
        let span = &spans[0];
        assert_eq!(attr(span, "http.query.q"), Some(Value::from("red shoes")));
        assert_eq!(attr(span, "http.query.page"), Some(Value::from("2")));
        assert_eq!(attr(span, "http.query.items"), Some(Value::I64(2)));
        assert_eq!(
            attr(span, "http.url"),
            Some(Value::from("/search?q=red+shoes&page=2"))
        );
    }

    #[test]
    fn test_server_error_marks_span() {
        let h = harness();
        run(&h, request("/boom", None), http::StatusCode::BAD_GATEWAY);

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].status, Status::error("HTTP 502"));
    }

    #[test]
    fn test_recording_span_is_reused() {
        let h = harness();
        let outer = h.tracer.start("outer");
        let outer_span_id = outer.span_context().span_id().to_string();
        let _guard = opentelemetry::Context::current_with_span(outer).attach();

        let (ctx, _) = run(&h, request("/nested", None), http::StatusCode::OK);

        assert_eq!(ctx.response_headers()[SPAN_ID_HEADER], outer_span_id);
        // Not owned: the middleware must leave the outer span open.
        assert!(h.exporter.get_finished_spans().unwrap().is_empty());

        let scope = trace_scope(&ctx);
        assert_eq!(scope.trace_info().span_id, outer_span_id);
    }

    #[test]
    fn test_on_error_records_exception() {
        let h = harness();
        let mut ctx = Context::default();
        let _ = h.middleware.on_request(request("/fail", None), &mut ctx);

        let err = std::io::Error::new(std::io::ErrorKind::Other, "db down");
        h.middleware.on_error(&err, &ctx);

        let spans = h.exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::error("handler_error: db down"));
        assert!(spans[0].events.iter().any(|e| e.name == "exception"));
    }

    #[test]
    fn test_trace_scope_correlates_logs() {
        let h = harness();
        let mut ctx = Context::default();
        let _ = h.middleware.on_request(request("/orders", None), &mut ctx);

        let info = trace_scope(&ctx).trace_info();
        assert_eq!(info.trace_id, ctx.response_headers()[TRACE_ID_HEADER]);
        assert_eq!(info.span_id, ctx.response_headers()[SPAN_ID_HEADER]);
    }

    #[test]
    fn test_trace_scope_missing() {
        let ctx = Context::default();
        assert!(trace_scope(&ctx).trace_info().is_empty());
        assert!(trace_scope(&ctx).tags().is_empty());
    }

    #[test]
    fn test_header_extractor() {
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", "00-1234-5678-01".parse().unwrap());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some("00-1234-5678-01"));
        assert_eq!(extractor.get("missing"), None);
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }
}
