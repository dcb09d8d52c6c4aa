//! Middleware pipeline for request/response processing.
//!
//! Middleware can:
//! - Inspect and modify incoming requests
//! - Short-circuit the pipeline and return early responses
//! - Modify outgoing responses
//! - Observe handler failures
//!
//! # Example
//!
//! ```rust,ignore
//! use tracelog::middleware::{Middleware, MiddlewareResult, MiddlewareChain};
//! use tracelog::core::{Request, Response, Context};
//!
//! struct TimingMiddleware;
//!
//! impl Middleware for TimingMiddleware {
//!     fn name(&self) -> &'static str { "timing" }
//!
//!     fn on_response(&self, res: Response, ctx: &Context) -> Response {
//!         res.with_header("x-elapsed-ms", ctx.elapsed().as_millis().to_string())
//!     }
//! }
//!
//! let chain = MiddlewareChain::new().add(TimingMiddleware);
//! ```

mod chain;

pub use chain::MiddlewareChain;

use crate::core::{Context, Request, Response};

/// Result of middleware request processing.
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to the next middleware with the (possibly modified) request.
    Next(Request),
    /// Stop the middleware chain and return this response immediately.
    Stop(Response),
}

impl MiddlewareResult {
    pub fn is_next(&self) -> bool {
        matches!(self, MiddlewareResult::Next(_))
    }
}

/// Trait for implementing middleware.
///
/// The pipeline executes `on_request` in priority order and `on_response`
/// (or `on_error`, when the handler fails) in reverse order.
///
/// ```text
/// Request → MW1.on_request → MW2.on_request → Handler
///                                                ↓
/// Response ← MW1.on_response ← MW2.on_response ←─┘
/// ```
pub trait Middleware: Send + Sync {
    /// Unique name for this middleware (used for logging/debugging).
    fn name(&self) -> &'static str;

    /// Priority for ordering in the chain.
    /// Lower values execute first for requests, last for responses.
    ///
    /// Suggested priority ranges:
    /// - -100..-50: Security (rate limiting, auth)
    /// - -50..0: Logging, tracing
    /// - 0..50: Request modification
    /// - 50..100: Response modification
    fn priority(&self) -> i32 {
        0
    }

    /// Process an incoming request.
    ///
    /// Return `MiddlewareResult::Next(req)` to continue the chain,
    /// or `MiddlewareResult::Stop(res)` to short-circuit with a response.
    fn on_request(&self, req: Request, _ctx: &mut Context) -> MiddlewareResult {
        MiddlewareResult::Next(req)
    }

    /// Process an outgoing response.
    fn on_response(&self, res: Response, _ctx: &Context) -> Response {
        res
    }

    /// Observe a handler failure. The error itself is returned to the caller
    /// unchanged.
    fn on_error(&self, _err: &(dyn std::error::Error + 'static), _ctx: &Context) {}
}
