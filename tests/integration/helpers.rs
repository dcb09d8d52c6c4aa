//! Test helpers and utilities

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::Value;

use tracelog::config::Config;
use tracelog::core::{Request, Response};
use tracelog::{LogRecord, RemoteSink, Telemetry};

/// Writer whose output stays readable after it is handed to a logger.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl SharedBuf {
    /// Every line written so far, parsed as JSON.
    pub fn lines(&self) -> Vec<Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).expect("log line is not JSON"))
            .collect()
    }

    /// The first line whose `msg` equals `msg`.
    pub fn find(&self, msg: &str) -> Option<Value> {
        self.lines().into_iter().find(|line| line["msg"] == msg)
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Remote sink keeping every record it receives.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RemoteSink for RecordingSink {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Configuration with export disabled and the given extra variables.
pub fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    Config::from_vars(&vars).expect("valid test config")
}

/// Telemetry with export disabled, logging JSON lines into the returned
/// buffer.
pub fn telemetry() -> (Telemetry, SharedBuf) {
    let buf = SharedBuf::default();
    let telemetry = Telemetry::init_with_writer(&config(&[("LOG_LEVEL", "debug")]), buf.clone())
        .expect("telemetry without export");
    (telemetry, buf)
}

/// GET request for `uri` with the given headers.
pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request {
    let mut builder = http::Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Bytes::new()).expect("valid request").into()
}

/// Assert a response header is a lowercase hex id of `len` characters.
#[track_caller]
pub fn assert_hex_header(res: &Response, name: &str, len: usize) -> String {
    let value = res
        .header(name)
        .unwrap_or_else(|| panic!("missing {} header", name));
    assert_eq!(value.len(), len, "{} = {}", name, value);
    assert!(
        value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
        "{} = {}",
        name,
        value
    );
    value.to_string()
}
