//! Trace-correlated structured logging.
//!
//! Every call produces one JSON line on the local sink and, when a remote sink
//! is configured, one copy of the same record there:
//!
//! ```json
//! {"level":"INFO","msg":"order placed","order_id":42,"span_id":"b7ad6b7169203331","time":"2024-12-28T15:04:05.123Z","trace_id":"0af7651916cd43dd8448eb211c80319c"}
//! ```
//!
//! The logger is an explicit handle. Build it once at startup and share it
//! with `Arc`:
//!
//! ```rust
//! use std::sync::Arc;
//! use tracelog::{log_event, Level, Logger, Scope, Tags};
//!
//! let logger = Arc::new(Logger::new(Level::Info));
//! let scope = Scope::new().with_tag("user", "alice");
//!
//! logger.info(&scope, "signed in");
//! log_event!(logger, &scope, Level::Warn, tags = &Tags::new().with("attempt", 3); "retry {}", 3);
//! ```

mod formatter;
mod level;
mod record;
mod remote;
mod timestamp;

pub use formatter::{init_subscriber, JsonFormatter};
pub use level::{Level, ParseLevelError};
pub use record::LogRecord;
pub use remote::{OtelLogSink, RemoteSink};
pub use timestamp::Timestamp;

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::scope::Scope;
use crate::tags::Tags;

type SharedWriter = Mutex<Box<dyn Write + Send>>;

/// Structured logger with a local JSON sink and an optional remote sink.
pub struct Logger {
    level: AtomicU8,
    writer: SharedWriter,
    remote: Option<Arc<dyn RemoteSink>>,
}

impl Logger {
    /// Logger writing to stdout.
    pub fn new(level: Level) -> Self {
        Self::with_writer(io::stdout(), level)
    }

    /// Logger writing to any output stream.
    pub fn with_writer<W: Write + Send + 'static>(writer: W, level: Level) -> Self {
        Self {
            level: AtomicU8::new(level as u8),
            writer: Mutex::new(Box::new(writer)),
            remote: None,
        }
    }

    /// Mirror every record to `sink`.
    pub fn with_remote(mut self, sink: Arc<dyn RemoteSink>) -> Self {
        self.remote = Some(sink);
        self
    }

    /// Check if a remote sink is configured.
    #[inline]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Minimum level written to the local sink.
    #[inline]
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Change the minimum local level.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
        tracing::info!(level = %level, "Logging level set");
    }

    /// Check if `level` passes the local filter.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Emit one record.
    ///
    /// `tags` are merged over the scope's tags for this call only.
    pub fn log(
        &self,
        scope: &Scope,
        level: Level,
        tags: Option<&Tags>,
        message: fmt::Arguments<'_>,
    ) {
        let mut all_tags = scope.tags();
        if let Some(extra) = tags {
            all_tags = all_tags.merge(extra);
        }
        self.emit(scope, level, all_tags, message.to_string());
    }

    pub fn debug(&self, scope: &Scope, message: impl fmt::Display) {
        self.log(scope, Level::Debug, None, format_args!("{}", message));
    }

    pub fn info(&self, scope: &Scope, message: impl fmt::Display) {
        self.log(scope, Level::Info, None, format_args!("{}", message));
    }

    pub fn warn(&self, scope: &Scope, message: impl fmt::Display) {
        self.log(scope, Level::Warn, None, format_args!("{}", message));
    }

    pub fn error(&self, scope: &Scope, message: impl fmt::Display) {
        self.log(scope, Level::Error, None, format_args!("{}", message));
    }

    /// Log an error value at Error level.
    ///
    /// The body is the error's message; `extra` tag sets are merged in order
    /// and `error=true` is always added.
    pub fn log_error(&self, scope: &Scope, err: &dyn std::error::Error, extra: &[&Tags]) {
        let mut tags = scope.tags();
        for set in extra {
            tags = tags.merge(set);
        }
        tags.insert("error", true);
        self.emit(scope, Level::Error, tags, err.to_string());
    }

    fn emit(&self, scope: &Scope, level: Level, tags: Tags, message: String) {
        let record = LogRecord::new(level, message, tags, scope.trace_info());

        if self.enabled(level) {
            let mut writer = match self.writer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // A broken sink must never fail the caller.
            let _ = record.write_line(&mut **writer).and_then(|_| writer.flush());
        }

        if let Some(remote) = &self.remote {
            remote.emit(&record);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

/// Log through a [`Logger`] with format arguments and optional per-call tags.
///
/// ```rust
/// # use tracelog::{log_event, Level, Logger, Scope, Tags};
/// # let logger = Logger::new(Level::Debug);
/// # let scope = Scope::new();
/// log_event!(logger, &scope, Level::Info, "cache warmed in {}ms", 12);
/// log_event!(logger, &scope, Level::Debug, tags = &Tags::new().with("shard", 4); "rebalanced");
/// ```
#[macro_export]
macro_rules! log_event {
    ($logger:expr, $scope:expr, $level:expr, tags = $tags:expr; $($arg:tt)+) => {
        $logger.log($scope, $level, Some($tags), format_args!($($arg)+))
    };
    ($logger:expr, $scope:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($scope, $level, None, format_args!($($arg)+))
    };
}
