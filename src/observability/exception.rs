//! Exception events on spans.

use std::backtrace::Backtrace;

use opentelemetry::trace::{SpanRef, Status};
use opentelemetry::KeyValue;

/// Record `err` on `span` as an `exception` event and mark the span failed.
///
/// The event carries `exception.type` (`name`), `exception.message` and
/// `exception.stacktrace` (captured here) on top of `attributes`. The span
/// status becomes `Error("<name>: <message>")`.
pub fn record_exception(
    span: &SpanRef<'_>,
    name: &str,
    err: &dyn std::error::Error,
    mut attributes: Vec<KeyValue>,
) {
    let message = err.to_string();

    attributes.push(KeyValue::new("exception.type", name.to_string()));
    attributes.push(KeyValue::new("exception.message", message.clone()));
    attributes.push(KeyValue::new(
        "exception.stacktrace",
        Backtrace::force_capture().to_string(),
    ));

    span.add_event("exception", attributes);
    span.set_status(Status::error(format!("{}: {}", name, message)));
}
