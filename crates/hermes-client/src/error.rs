//! Error types for outbound calls.

use crate::response::HttpClientResponse;
use hermes_core::Done;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`ResilientHttpClient`](crate::ResilientHttpClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a 4xx or 5xx status.
    ///
    /// The full response is kept so callers can inspect status, headers and
    /// body.
    #[error("got {}: {}", .0.status(), .0.body_as_string())]
    Status(Box<HttpClientResponse>),

    /// Every attempt failed before a response was read.
    #[error("transport error after {attempts} attempt(s): {source}")]
    Transport {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the last attempt.
        #[source]
        source: reqwest::Error,
    },

    /// TLS material could not be loaded.
    #[error("TLS error: {message}")]
    Tls {
        /// Error message.
        message: String,
    },

    /// The client or call configuration is unusable.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// The method or URL could not be turned into a request.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// The calling context was cancelled or ran past its deadline.
    #[error("request aborted: {0}")]
    Cancelled(#[from] Done),
}

impl ClientError {
    /// Create a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns the response behind a [`ClientError::Status`] error.
    pub fn response(&self) -> Option<&HttpClientResponse> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }

    /// Returns the HTTP status behind a [`ClientError::Status`] error.
    pub fn status(&self) -> Option<http::StatusCode> {
        self.response().map(HttpClientResponse::status)
    }

    /// Returns `true` for errors raised before any attempt was made.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Tls { .. } | Self::Config { .. } | Self::InvalidRequest { .. }
        )
    }
}
