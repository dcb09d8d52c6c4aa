//! The structured record produced by one log call.

use std::io::{self, Write};

use serde_json::{Map, Value};

use super::{Level, Timestamp};
use crate::tags::Tags;
use crate::trace_context::TraceInfo;

/// One log event: built at the call site, emitted, then dropped.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub level: Level,
    pub message: String,
    pub tags: Tags,
    pub trace: TraceInfo,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    pub fn new(level: Level, message: String, tags: Tags, trace: TraceInfo) -> Self {
        Self {
            timestamp: Timestamp::now(),
            level,
            message,
            tags,
            trace,
        }
    }

    /// JSON object for the local sink.
    ///
    /// Tags are flattened next to the fixed fields. A tag named like a fixed
    /// field (`time`, `level`, `msg`, `trace_id`, `span_id`) is shadowed.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (key, value) in &self.tags {
            obj.insert(key.clone(), value.clone());
        }
        obj.insert("time".into(), Value::String(self.timestamp.to_string()));
        obj.insert("level".into(), Value::String(self.level.as_str().into()));
        obj.insert("msg".into(), Value::String(self.message.clone()));
        if !self.trace.is_empty() {
            obj.insert("trace_id".into(), Value::String(self.trace.trace_id.clone()));
            obj.insert("span_id".into(), Value::String(self.trace.span_id.clone()));
        }
        Value::Object(obj)
    }

    /// Write the record as a single JSON line.
    pub fn write_line<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *writer, &self.to_json())?;
        writer.write_all(b"\n")
    }
}
