//! Core types for HTTP request/response handling.
//!
//! - [`Request`] - HTTP request abstraction
//! - [`Response`] - HTTP response abstraction with builder pattern
//! - [`Context`] - Request context for middleware communication
//! - [`Error`] - Handler error type
//!
//! # Example
//!
//! ```rust,ignore
//! use tracelog::core::{Request, Response, Context};
//!
//! fn handle_request(req: &Request, ctx: &mut Context) -> Response {
//!     ctx.set_response_header("X-Custom", "value");
//!     Response::ok("Hello, World!")
//! }
//! ```

mod context;
mod error;
mod request;
mod response;

pub use context::Context;
pub use error::{Error, Result};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
