//! # Hermes Middleware
//!
//! The interceptor chain that every inbound request runs through.
//!
//! ```text
//! Request → RequestId → Tenant → Tracing → Handler
//!                                            ↓
//! Response ← RequestId ← Tenant ← Tracing ←──┘
//! ```
//!
//! A [`MiddlewareChain`] is an ordered list of [`Interceptor`]s. It is
//! composed once around a terminal [`Handler`] into a [`ComposedHandler`],
//! which is then shared read-only by every request. Each interceptor gets the
//! [`RequestContext`](hermes_core::RequestContext) by value, derives an
//! enriched one, and hands it to the [`Next`] continuation.
//!
//! ## Example
//!
//! ```
//! use hermes_core::RequestContext;
//! use hermes_middleware::{handler_fn, ChainConfig, MiddlewareChain, Response, ResponseExt};
//! use http::StatusCode;
//!
//! let chain = MiddlewareChain::standard(&ChainConfig::default()).unwrap();
//! let app = chain.build(handler_fn(|ctx: RequestContext, _req| async move {
//!     ctx.logger().info("handling request");
//!     Response::text(StatusCode::OK, "hello")
//! }));
//! # let _ = app;
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod config;
pub mod error;
pub mod interceptors;
pub mod middleware;
pub mod types;

pub use chain::{ComposedHandler, MiddlewareChain};
pub use config::ChainConfig;
pub use error::MiddlewareError;
pub use interceptors::{
    RequestIdInterceptor, TenantInterceptor, TracingInterceptor, REQUEST_ID_HEADER, TENANT_HEADER,
};
pub use middleware::{handler_fn, BoxFuture, FnInterceptor, Handler, HandlerFn, Interceptor, Next};
pub use types::{ErrorEnvelope, Request, Response, ResponseExt};
