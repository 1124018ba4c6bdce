//! # Hermes
//!
//! **Request-handling spine for HTTP services**
//!
//! Hermes gives every inbound request:
//!
//! - a [`RequestContext`](prelude::RequestContext) carrying its request ID,
//!   tenant, trace identifiers, deadline and a structured logger
//! - a fixed interceptor pipeline that reads and writes those identifiers
//! - a [`ResilientHttpClient`](prelude::ResilientHttpClient) that carries them
//!   to downstream services, retrying transient failures
//! - signal-driven graceful shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hermes::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_file("hermes.toml")?.with_env_overrides();
//!
//!     hermes::run(
//!         config,
//!         handler_fn(|ctx: RequestContext, _request| async move {
//!             ctx.logger().info("hello");
//!             Response::text(http::StatusCode::OK, "hello")
//!         }),
//!     )
//!     .await
//! }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! Request → RequestId → Tenant → Tracing → Handler
//!                                             ↓
//! Response ← RequestId ← Tenant ← Tracing ←───┘
//! ```

#![forbid(unsafe_code)]

pub use hermes_client as client;
pub use hermes_core as core;
pub use hermes_middleware as middleware;
pub use hermes_server as server;
pub use hermes_telemetry as telemetry;

use hermes_middleware::Handler;
use hermes_server::{HttpServer, ServerConfig, Signal};

/// Prelude module for convenient imports.
///
/// ```rust
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use hermes_core::{ContextualLogger, Done, RequestContext, RequestId};

    pub use hermes_middleware::{
        handler_fn, ChainConfig, Handler, Interceptor, MiddlewareChain, Next, Request,
        Response, ResponseExt,
    };

    pub use hermes_client::{
        ClientError, HttpClientOptions, HttpClientResponse, ResilientHttpClient, RetryPolicy,
        StatusClass, TlsPolicy,
    };

    pub use hermes_server::{
        trap, HttpServer, ServerConfig, ServerError, ShutdownSignal, Signal,
    };

    pub use hermes_telemetry::{init_telemetry, LogConfig, TelemetryConfig, TelemetryGuard};
}

/// Runs a server with the standard chain around `terminal` until a shutdown
/// signal arrives.
///
/// Validates `config`, installs logging and tracing from `config.telemetry`,
/// then serves. Telemetry is flushed when this returns.
///
/// # Errors
///
/// Fails if the configuration is invalid, telemetry cannot be installed, the
/// listener cannot be bound or the signal handlers cannot be registered.
pub async fn run(config: ServerConfig, terminal: impl Handler) -> anyhow::Result<()> {
    config.validate()?;
    let _telemetry = hermes_telemetry::init_telemetry(&config.telemetry)?;

    HttpServer::standard(config, terminal)?
        .on_shutdown(|signal: Signal| {
            tracing::info!(signal = %signal, "draining before exit");
            Ok(())
        })
        .start()
        .await?;

    Ok(())
}
