//! Trace identity carried across boundaries as plain values.
//!
//! Trace ids are 16 bytes written as 32 lowercase hex chars, span ids are
//! 8 bytes written as 16 lowercase hex chars:
//!
//! ```text
//! trace-id: 0af7651916cd43dd8448eb211c80319c
//! span-id:  b7ad6b7169203331
//! ```
//!
//! Parsing never fails. Anything that is not exactly a canonical non-zero id
//! becomes the invalid (all-zero) id, so a bad correlation header can only
//! cost trace identity, never the request.

use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use serde::Serialize;

use crate::scope::Scope;

/// Length of a trace id in hex chars.
pub const TRACE_ID_HEX_LEN: usize = 32;

/// Length of a span id in hex chars.
pub const SPAN_ID_HEX_LEN: usize = 16;

/// Trace identity snapshot for structured output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TraceInfo {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: String,
}

impl TraceInfo {
    /// Snapshot a span context. Empty if the context is invalid.
    pub fn from_span_context(span_context: &SpanContext) -> Self {
        if !span_context.is_valid() {
            return Self::default();
        }
        Self {
            trace_id: span_context.trace_id().to_string(),
            span_id: span_context.span_id().to_string(),
            trace_flags: format!("{:02x}", span_context.trace_flags().to_u8()),
        }
    }

    /// Check if no trace identity is present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trace_id.is_empty()
    }
}

/// Trace identity of the active span in an OpenTelemetry context.
pub fn extract_trace_info(cx: &opentelemetry::Context) -> TraceInfo {
    TraceInfo::from_span_context(cx.span().span_context())
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a 32-char lowercase hex trace id. Invalid input yields `TraceId::INVALID`.
pub fn parse_trace_id(s: &str) -> TraceId {
    match decode_hex::<TRACE_ID_HEX_LEN>(s) {
        Some(v) => TraceId::from_bytes(v.to_be_bytes()),
        None => TraceId::INVALID,
    }
}

/// Parse a 16-char lowercase hex span id. Invalid input yields `SpanId::INVALID`.
pub fn parse_span_id(s: &str) -> SpanId {
    match decode_hex::<SPAN_ID_HEX_LEN>(s) {
        // 16 hex chars always fit in a u64
        Some(v) => SpanId::from_bytes((v as u64).to_be_bytes()),
        None => SpanId::INVALID,
    }
}

/// Decode exactly `N` lowercase hex chars. Zero counts as invalid.
fn decode_hex<const N: usize>(s: &str) -> Option<u128> {
    if s.len() != N || !is_valid_hex(s) || is_all_zeros(s) {
        return None;
    }
    u128::from_str_radix(s, 16).ok()
}

/// Check if string contains only lowercase hex characters.
#[inline]
fn is_valid_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Check if string is all zeros.
#[inline]
fn is_all_zeros(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

// =============================================================================
// Scope <-> tracing state
// =============================================================================

/// Copy the ambient trace identity onto the scope as plain id text.
///
/// The ambient state is the scope's attached OpenTelemetry context, or the
/// thread's current context when none is attached. Without a trace id, empty
/// text is attached. Use this before handing a scope to work that the tracing
/// library's own propagation does not reach, such as a spawned task.
pub fn set_trace_context(scope: &Scope) -> Scope {
    let current;
    let cx = match scope.otel_context() {
        Some(cx) => cx,
        None => {
            current = opentelemetry::Context::current();
            &current
        }
    };

    let span = cx.span();
    let span_context = span.span_context();
    if span_context.trace_id() != TraceId::INVALID {
        scope.with_trace_ids(
            span_context.trace_id().to_string(),
            span_context.span_id().to_string(),
        )
    } else {
        scope.with_trace_ids("", "")
    }
}

/// Rebuild a remote span context from the scope's plain id text.
///
/// The result is attached to the scope as its OpenTelemetry context. When the
/// attached context already has an active span with the same identity it is
/// kept as is, so a span that is still recording stays reachable. Ids that do
/// not form a valid span context leave the attached context untouched, so a
/// span started under it begins a new trace.
pub fn recover_span_context(scope: &Scope) -> Scope {
    let (raw_trace_id, raw_span_id) = scope.trace_ids().unwrap_or(("", ""));
    let trace_id = parse_logged(raw_trace_id, "trace ID", parse_trace_id, TraceId::INVALID);
    let span_id = parse_logged(raw_span_id, "span ID", parse_span_id, SpanId::INVALID);

    let base = scope.otel_context().cloned().unwrap_or_default();
    {
        let active = base.span();
        let active = active.span_context();
        if active.is_valid() && active.trace_id() == trace_id && active.span_id() == span_id {
            return scope.with_otel_context(base);
        }
    }

    tracing::debug!(
        trace_id = %trace_id,
        span_id = %span_id,
        "processing trace context"
    );

    let span_context = SpanContext::new(
        trace_id,
        span_id,
        TraceFlags::default(),
        true,
        TraceState::default(),
    );
    if !span_context.is_valid() {
        return scope.with_otel_context(base);
    }
    scope.with_otel_context(base.with_remote_span_context(span_context))
}

fn parse_logged<T: PartialEq>(raw: &str, what: &str, parse: fn(&str) -> T, invalid: T) -> T {
    if raw.is_empty() {
        return invalid;
    }
    let parsed = parse(raw);
    if parsed == invalid {
        tracing::debug!(value = raw, "invalid {} format", what);
    }
    parsed
}

// =============================================================================
// Tests
// =============================================================================
