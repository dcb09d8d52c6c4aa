//! Middleware chain for composing multiple middleware.

use std::sync::Arc;

use super::{Middleware, MiddlewareResult};
use crate::core::{Context, Request, Response};

/// A chain of middleware that processes requests and responses in order.
///
/// Middleware are executed in priority order for requests (lowest first)
/// and in reverse order for responses and errors. Headers queued with
/// [`Context::set_response_header`] are applied to every outgoing response.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain, keeping priority order.
    pub fn add<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.add_arc(Arc::new(middleware))
    }

    /// Add a middleware wrapped in Arc to the chain.
    pub fn add_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        // Stable: equal priorities keep insertion order.
        self.middlewares.sort_by_key(|m| m.priority());
        self
    }

    /// Middleware names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run a request through all middleware.
    ///
    /// Returns `MiddlewareResult::Next(req)` if all middleware passed,
    /// or `MiddlewareResult::Stop(res)` if any middleware short-circuited.
    pub fn process_request(&self, mut req: Request, ctx: &mut Context) -> MiddlewareResult {
        for mw in &self.middlewares {
            match mw.on_request(req, ctx) {
                MiddlewareResult::Next(r) => req = r,
                MiddlewareResult::Stop(res) => {
                    tracing::debug!(
                        middleware = mw.name(),
                        status = %res.status(),
                        "middleware short-circuited request"
                    );
                    return MiddlewareResult::Stop(res);
                }
            }
        }
        MiddlewareResult::Next(req)
    }

    /// Run a response through all middleware in reverse order, then apply
    /// the context's queued response headers.
    pub fn process_response(&self, mut res: Response, ctx: &Context) -> Response {
        for mw in self.middlewares.iter().rev() {
            res = mw.on_response(res, ctx);
        }
        for (name, value) in ctx.response_headers() {
            res = res.with_header(name, value);
        }
        res
    }

    /// Notify all middleware of a handler failure, in reverse order.
    pub fn process_error(&self, err: &(dyn std::error::Error + 'static), ctx: &Context) {
        for mw in self.middlewares.iter().rev() {
            mw.on_error(err, ctx);
        }
    }

    /// Process a complete request/response cycle with a sync handler.
    pub fn process<F>(&self, req: Request, ctx: &mut Context, handler: F) -> Response
    where
        F: FnOnce(Request, &mut Context) -> Response,
    {
        let req = match self.process_request(req, ctx) {
            MiddlewareResult::Next(req) => req,
            // Short-circuited responses still get response middleware.
            MiddlewareResult::Stop(res) => return self.process_response(res, ctx),
        };

        let res = handler(req, ctx);
        self.process_response(res, ctx)
    }

    /// Async version of [`process`](Self::process).
    pub async fn process_async<F, Fut>(
        &self,
        req: Request,
        ctx: &mut Context,
        handler: F,
    ) -> Response
    where
        F: FnOnce(Request, &mut Context) -> Fut,
        Fut: std::future::Future<Output = Response>,
    {
        let req = match self.process_request(req, ctx) {
            MiddlewareResult::Next(req) => req,
            MiddlewareResult::Stop(res) => return self.process_response(res, ctx),
        };

        let res = handler(req, ctx).await;
        self.process_response(res, ctx)
    }

    /// Like [`process_async`](Self::process_async) for fallible handlers.
    ///
    /// A handler error runs `on_error` through the chain and is then returned
    /// unchanged; response middleware is skipped for it.
    pub async fn try_process_async<F, Fut, E>(
        &self,
        req: Request,
        ctx: &mut Context,
        handler: F,
    ) -> Result<Response, E>
    where
        F: FnOnce(Request, &mut Context) -> Fut,
        Fut: std::future::Future<Output = Result<Response, E>>,
        E: std::error::Error + 'static,
    {
        let req = match self.process_request(req, ctx) {
            MiddlewareResult::Next(req) => req,
            MiddlewareResult::Stop(res) => return Ok(self.process_response(res, ctx)),
        };

        match handler(req, ctx).await {
            Ok(res) => Ok(self.process_response(res, ctx)),
            Err(err) => {
                self.process_error(&err, ctx);
                Err(err)
            }
        }
    }
}
