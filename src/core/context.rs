//! Request context for middleware pipeline.

use std::any::Any;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

/// Request context shared across middleware and handlers.
///
/// Carries request-scoped data through the middleware pipeline: client
/// address, timing, response headers to add, and typed values that one
/// middleware leaves for another (the tracing middleware stores the request
/// [`Scope`](crate::Scope) here).
pub struct Context {
    /// Client IP address.
    pub client_ip: IpAddr,

    /// Request start time.
    pub started_at: Instant,

    /// Response headers to add.
    response_headers: HashMap<String, String>,

    /// Custom key-value storage for middleware.
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    /// Create a new context.
    #[inline]
    pub fn new(client_ip: IpAddr) -> Self {
        Self {
            client_ip,
            started_at: Instant::now(),
            response_headers: HashMap::with_capacity(4),
            values: HashMap::new(),
        }
    }

    /// Set a custom value.
    #[inline]
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), Box::new(value));
    }

    /// Get a custom value.
    #[inline]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Add a response header.
    #[inline]
    pub fn set_response_header(&mut self, name: impl Into<String>, value: impl ToString) {
        self.response_headers.insert(name.into(), value.to_string());
    }

    /// Get all response headers to add.
    #[inline]
    pub fn response_headers(&self) -> &HashMap<String, String> {
        &self.response_headers
    }

    /// Get elapsed time since request started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("client_ip", &self.client_ip)
            .field("response_headers", &self.response_headers)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
