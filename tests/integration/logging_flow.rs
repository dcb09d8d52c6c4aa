//! Logger behavior across sinks: local JSON lines, remote mirroring and
//! explicit trace identity on scopes.

use std::io::Read;
use std::sync::Arc;

use crate::helpers::*;
use serde_json::json;
use tracelog::{log_event, recover_span_context, set_trace_context, Level, Logger, Scope, Tags};

const TRACE: &str = "0af7651916cd43dd8448eb211c80319c";
const SPAN: &str = "b7ad6b7169203331";

/// Records below the local level still reach the remote sink
#[test]
fn test_remote_receives_filtered_records() {
    let buf = SharedBuf::default();
    let sink = Arc::new(RecordingSink::default());
    let logger = Logger::with_writer(buf.clone(), Level::Warn).with_remote(sink.clone());
    let scope = Scope::new().with_tag("job", "reindex");

    logger.debug(&scope, "batch 1 of 4");
    logger.error(&scope, "batch 2 failed");

    let local = buf.lines();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0]["msg"], json!("batch 2 failed"));

    let remote = sink.records();
    assert_eq!(remote.len(), 2);
    assert_eq!(remote[0].level, Level::Debug);
    assert_eq!(remote[0].tags.get("job"), Some(&json!("reindex")));
}

/// Per-call tags override scope tags of the same name
#[test]
fn test_call_tags_override_scope_tags() {
    let buf = SharedBuf::default();
    let logger = Logger::with_writer(buf.clone(), Level::Debug);
    let scope = Scope::new().with_tag("attempt", 1).with_tag("queue", "mail");

    let retry = Tags::new().with("attempt", 2);
    log_event!(logger, &scope, Level::Info, tags = &retry; "retrying {}", "send");

    let line = buf.find("retrying send").expect("line logged");
    assert_eq!(line["attempt"], json!(2));
    assert_eq!(line["queue"], json!("mail"));
}

/// Explicit ids on a scope survive recovery and show up in log lines
#[test]
fn test_explicit_ids_are_logged() {
    let buf = SharedBuf::default();
    let logger = Logger::with_writer(buf.clone(), Level::Info);

    let scope = recover_span_context(&Scope::new().with_trace_ids(TRACE, SPAN));
    logger.info(&scope, "resumed");

    let line = buf.find("resumed").expect("line logged");
    assert_eq!(line["trace_id"], json!(TRACE));
    assert_eq!(line["span_id"], json!(SPAN));

    // The recovered context round-trips back to the same text ids.
    let again = set_trace_context(&scope);
    assert_eq!(again.trace_ids(), Some((TRACE, SPAN)));
}

/// A file works as the local sink
#[test]
fn test_file_sink() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let writer = file.reopen().unwrap();
    let logger = Logger::with_writer(writer, Level::Info);

    logger.warn(&Scope::new().with_tag("disk", "sda1"), "disk almost full");
    logger.debug(&Scope::new(), "dropped");

    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["level"], json!("WARN"));
    assert_eq!(value["disk"], json!("sda1"));
    assert!(value["time"].is_string());
}

/// LOG_LEVEL from configuration drives the telemetry logger
#[test]
fn test_configured_level() {
    let buf = SharedBuf::default();
    let config = config(&[("LOG_LEVEL", "error")]);
    let telemetry = tracelog::Telemetry::init_with_writer(&config, buf.clone()).unwrap();
    let logger = telemetry.logger();

    logger.warn(&Scope::new(), "not written");
    logger.error(&Scope::new(), "written");

    let lines = buf.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["msg"], json!("written"));
}
