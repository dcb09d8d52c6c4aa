//! Remote telemetry sink for log records.

use std::time::SystemTime;

use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _};
use opentelemetry_sdk::logs::{Logger as SdkLogger, LoggerProvider as SdkLoggerProvider};

use super::LogRecord;
use crate::tags::value_text;

/// Destination that receives a copy of every log record.
///
/// Implementations own their batching, filtering and retry policy and must
/// not block the caller for long.
pub trait RemoteSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Mirrors records to an OpenTelemetry logger provider.
pub struct OtelLogSink {
    logger: SdkLogger,
}

impl OtelLogSink {
    /// Create a sink backed by a logger named `name` from `provider`.
    pub fn new(provider: &SdkLoggerProvider, name: impl Into<String>) -> Self {
        Self {
            logger: provider.logger(name.into()),
        }
    }
}

impl RemoteSink for OtelLogSink {
    fn emit(&self, record: &LogRecord) {
        let mut otel = self.logger.create_log_record();
        otel.set_timestamp(record.timestamp.system_time());
        otel.set_observed_timestamp(SystemTime::now());
        otel.set_severity_number(record.level.severity());
        otel.set_severity_text(record.level.as_str());
        otel.set_body(AnyValue::from(record.message.clone()));

        if !record.trace.is_empty() {
            otel.add_attribute("trace_id", record.trace.trace_id.clone());
            otel.add_attribute("span_id", record.trace.span_id.clone());
        }
        for (key, value) in &record.tags {
            otel.add_attribute(key.clone(), value_text(value));
        }

        self.logger.emit(otel);
    }
}

impl std::fmt::Debug for OtelLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelLogSink").finish_non_exhaustive()
    }
}
