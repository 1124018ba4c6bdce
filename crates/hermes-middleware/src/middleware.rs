//! Core interceptor trait and types.
//!
//! An [`Interceptor`] is one stage of the chain. It receives the request
//! context by value, the request, and a [`Next`] continuation standing for
//! the rest of the chain. A [`Handler`] is whatever the continuation runs:
//! either the next bound interceptor or the terminal handler.
//!
//! # Example
//!
//! ```
//! use hermes_core::RequestContext;
//! use hermes_middleware::{BoxFuture, Interceptor, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Interceptor for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn intercept<'a>(
//!         &'a self,
//!         ctx: RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let logger = ctx.logger().clone();
//!             let started = std::time::Instant::now();
//!             let response = next.run(ctx, request).await;
//!             logger.debug(&format!("took {:?}", started.elapsed()));
//!             response
//!         })
//!     }
//! }
//! ```

use crate::types::{Request, Response, ResponseExt};
use hermes_core::{Done, RequestContext};
use http::StatusCode;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that turns a request into a response.
pub trait Handler: Send + Sync + 'static {
    /// Handles the request.
    fn call<'a>(&'a self, ctx: RequestContext, request: Request) -> BoxFuture<'a, Response>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call<'a>(&'a self, ctx: RequestContext, request: Request) -> BoxFuture<'a, Response> {
        (**self).call(ctx, request)
    }
}

/// One stage of the interceptor chain.
///
/// # Contract
///
/// Every interceptor must, on every path, either return a response of its
/// own (short-circuiting all inner stages) or run `next` and return what it
/// produced, optionally decorated. An interceptor that does neither hangs
/// the request. The chain does not detect this; each interceptor's tests
/// must cover it.
///
/// [`Next::run`] consumes the continuation, so it can run at most once.
pub trait Interceptor: Send + Sync + 'static {
    /// Returns the name of this interceptor, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    fn intercept<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The rest of the chain, handed to each interceptor.
pub struct Next<'a> {
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Creates a continuation that runs `handler`.
    pub fn new(handler: &'a dyn Handler) -> Self {
        Self { handler }
    }

    /// Runs the rest of the chain.
    ///
    /// The continuation is raced against the context's cancellation and
    /// deadline. If the context finishes first the continuation is dropped,
    /// aborting any work it had in flight, and an error response is returned:
    /// `503` on cancellation, `504` on deadline.
    pub async fn run(self, ctx: RequestContext, request: Request) -> Response {
        let watch = ctx.clone();
        match watch.run(self.handler.call(ctx, request)).await {
            Ok(response) => response,
            Err(done) => {
                let status = match done {
                    Done::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                    Done::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
                };
                watch.logger().warn(&format!("request aborted: {done}"));
                Response::json_error(status, &done.to_string(), &watch)
            }
        }
    }
}

/// An interceptor built from a closure.
///
/// # Example
///
/// ```
/// use hermes_middleware::{FnInterceptor, Next};
///
/// let tagging = FnInterceptor::new("tagging", |ctx, request, next: Next<'_>| {
///     Box::pin(async move {
///         let mut response = next.run(ctx, request).await;
///         response.headers_mut().insert("x-served-by", "hermes".parse().unwrap());
///         response
///     })
/// });
/// ```
pub struct FnInterceptor<F> {
    name: &'static str,
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: for<'a> Fn(RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new closure-based interceptor.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn intercept<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}

/// A terminal handler built from an async closure.
pub struct HandlerFn<F> {
    func: F,
}

/// Wraps an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(func: F) -> HandlerFn<F>
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    HandlerFn { func }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call<'a>(&'a self, ctx: RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin((self.func)(ctx, request))
    }
}
