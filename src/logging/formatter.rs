//! JSON formatter for the crate's own `tracing` diagnostics.
//!
//! Lines share the shape of [`LogRecord`](super::LogRecord) output so both
//! streams can be shipped through the same pipeline:
//! ```json
//! {"time":"2024-12-28T15:04:05.123Z","level":"INFO","msg":"Listening on http://0.0.0.0:8080","service":"tracelog","target":"tracelog_demo"}
//! ```

use opentelemetry::trace::{TraceContextExt, TraceId};
use serde_json::{Map, Value};
use tracing::{Event, Subscriber};
use tracing_opentelemetry::OtelData;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::{Level, Timestamp};
use crate::config::LoggingConfig;
use crate::observability::TelemetryError;

/// Custom JSON formatter for tracing.
pub struct JsonFormatter {
    service_name: String,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn level(level: &tracing::Level) -> Level {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = visitor.fields;
        entry.insert("time".into(), Value::String(Timestamp::now().to_string()));
        entry.insert(
            "level".into(),
            Value::String(Self::level(meta.level()).as_str().into()),
        );
        entry.insert(
            "msg".into(),
            Value::String(visitor.message.unwrap_or_default()),
        );
        entry.insert("service".into(), Value::String(self.service_name.clone()));
        entry.insert("target".into(), Value::String(meta.target().into()));

        // Correlate with the enclosing span when the OpenTelemetry layer is on.
        if let Some(span) = ctx.lookup_current() {
            let extensions = span.extensions();
            if let Some(otel) = extensions.get::<OtelData>() {
                let trace_id = otel
                    .builder
                    .trace_id
                    .unwrap_or_else(|| otel.parent_cx.span().span_context().trace_id());
                if trace_id != TraceId::INVALID {
                    entry.insert("trace_id".into(), Value::String(trace_id.to_string()));
                    if let Some(span_id) = otel.builder.span_id {
                        entry.insert("span_id".into(), Value::String(span_id.to_string()));
                    }
                }
            }
        }

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&Value::Object(entry)).unwrap_or_default()
        )
    }
}

/// Field visitor for collecting tracing fields.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.into());
    }
}

/// Install the global `tracing` subscriber.
///
/// With a tracer, `tracing` spans are also exported as OpenTelemetry spans.
pub fn init_subscriber(
    config: &LoggingConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter '{}': {}", config.filter, e);
        EnvFilter::new("tracelog=info")
    });

    let fmt_layer =
        tracing_subscriber::fmt::layer().event_format(JsonFormatter::new(&config.service_name));
    let otel_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}
