//! # Hermes Server
//!
//! Serving and stopping a Hermes service.
//!
//! - [`HttpServer`] - hyper HTTP/1.1 server in front of a composed middleware chain
//! - [`trap`] / [`ShutdownSignal`] - turn the first OS signal into a one-shot close
//! - [`ServerConfig`] - TOML/JSON configuration with `HERMES_*` overrides
//! - [`ServerTlsConfig`] - optional HTTPS from PEM certificate and key files
//!
//! ## Example
//!
//! ```rust,no_run
//! use hermes_middleware::{handler_fn, Response, ResponseExt};
//! use hermes_server::{HttpServer, ServerConfig};
//! use http::StatusCode;
//!
//! # async fn example() -> Result<(), hermes_server::ServerError> {
//! let config = ServerConfig::default().with_bind_addr("127.0.0.1:8080");
//! let server = HttpServer::standard(
//!     config,
//!     handler_fn(|_ctx, _req| async { Response::text(StatusCode::OK, "hello") }),
//! )?
//! .on_shutdown(|signal| {
//!     tracing::info!(%signal, "shutting down");
//!     Ok(())
//! });
//!
//! server.start().await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod server;
pub mod shutdown;
pub mod tls;

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError, ServerResult, ShutdownError};
pub use server::{BoundServer, HttpServer};
pub use shutdown::{trap, ConnectionTracker, ShutdownCallback, ShutdownSignal, Signal};
pub use tls::ServerTlsConfig;
