//! Chain composition.
//!
//! A [`MiddlewareChain`] is an ordered list of interceptors. [`build`] folds
//! it around a terminal handler once, at start-up, from the last interceptor
//! to the first:
//!
//! ```text
//! current = terminal
//! for i in (0..n).rev() { current = bind(chain[i], current) }
//! ```
//!
//! Interceptor 0 ends up outermost: first to see the request, last to see
//! the response. The resulting [`ComposedHandler`] is immutable and shared
//! by every request.
//!
//! [`build`]: MiddlewareChain::build

use crate::config::ChainConfig;
use crate::error::MiddlewareError;
use crate::interceptors::{RequestIdInterceptor, TenantInterceptor, TracingInterceptor};
use crate::middleware::{BoxFuture, Handler, Interceptor, Next};
use crate::types::{Request, Response};
use hermes_core::RequestContext;
use std::fmt;
use std::sync::Arc;

/// An ordered list of interceptors, not yet bound to a handler.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the standard chain: request ID, tenant, tracing.
    ///
    /// Identity runs first so every later stage can rely on a request ID.
    /// Tracing runs last so its span tags see the resolved identity and
    /// tenant.
    pub fn standard(config: &ChainConfig) -> Result<Self, MiddlewareError> {
        Ok(Self::new()
            .with(RequestIdInterceptor::with_header(&config.request_id_header)?)
            .with(TenantInterceptor::with_header(&config.tenant_header)?)
            .with(TracingInterceptor::from_global()))
    }

    /// Appends an interceptor. Later interceptors run closer to the handler.
    #[must_use]
    pub fn with(self, interceptor: impl Interceptor) -> Self {
        self.with_arc(Arc::new(interceptor))
    }

    /// Appends a shared interceptor.
    #[must_use]
    pub fn with_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Returns the number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns `true` if the chain has no interceptors.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Returns interceptor names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Composes the chain around `terminal`.
    pub fn build(&self, terminal: impl Handler) -> ComposedHandler {
        self.build_arc(Arc::new(terminal))
    }

    /// Composes the chain around a shared terminal handler.
    pub fn build_arc(&self, terminal: Arc<dyn Handler>) -> ComposedHandler {
        let root = self
            .interceptors
            .iter()
            .rev()
            .fold(terminal, |next, interceptor| -> Arc<dyn Handler> {
                Arc::new(Bound {
                    interceptor: Arc::clone(interceptor),
                    next,
                })
            });
        ComposedHandler {
            root,
            bare: self.interceptors.is_empty(),
        }
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// An interceptor bound to the handler it continues into.
struct Bound {
    interceptor: Arc<dyn Interceptor>,
    next: Arc<dyn Handler>,
}

impl Handler for Bound {
    fn call<'a>(&'a self, ctx: RequestContext, request: Request) -> BoxFuture<'a, Response> {
        tracing::trace!(interceptor = self.interceptor.name(), "entering interceptor");
        self.interceptor
            .intercept(ctx, request, Next::new(self.next.as_ref()))
    }
}

/// A chain composed around its terminal handler.
///
/// Cheap to clone; all clones share the same composition.
#[derive(Clone)]
pub struct ComposedHandler {
    root: Arc<dyn Handler>,
    bare: bool,
}

impl ComposedHandler {
    /// Runs a request through the whole chain.
    ///
    /// The outermost interceptor always runs, even for a context that is
    /// already done, so it can still decorate the abort response. Every
    /// inner stage is reached through [`Next::run`] and raced against the
    /// context. A chain without interceptors races the terminal directly.
    pub async fn handle(&self, ctx: RequestContext, request: Request) -> Response {
        if self.bare {
            Next::new(self.root.as_ref()).run(ctx, request).await
        } else {
            self.root.call(ctx, request).await
        }
    }
}

impl Handler for ComposedHandler {
    fn call<'a>(&'a self, ctx: RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(self.handle(ctx, request))
    }
}

impl fmt::Debug for ComposedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedHandler").finish_non_exhaustive()
    }
}
