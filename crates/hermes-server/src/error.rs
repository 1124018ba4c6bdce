//! Server error types.

use crate::shutdown::Signal;
use hermes_middleware::MiddlewareError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or checking a [`ServerConfig`](crate::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not `toml` or `json`.
    #[error("unsupported config format: {0:?}")]
    UnsupportedFormat(String),

    /// The file contents could not be parsed.
    #[error("invalid {format}: {message}")]
    Parse {
        /// `TOML` or `JSON`.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// TLS certificate or key material is unusable.
    #[error("invalid TLS configuration: {0}")]
    Tls(String),
}

/// Errors from installing the shutdown coordinator.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// No signals were requested.
    #[error("at least one shutdown signal is required")]
    NoSignals,

    /// A signal name was not recognized.
    #[error("unknown signal {0:?}")]
    UnknownSignal(String),

    /// The signal cannot be trapped on this platform.
    #[error("signal {0} is not supported on this platform")]
    Unsupported(Signal),

    /// The OS refused to install the handler.
    #[error("failed to register handler for {signal}: {source}")]
    Register {
        /// The signal being registered.
        signal: Signal,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Signal handling could not be installed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// The standard chain could not be built.
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    /// The listener could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
