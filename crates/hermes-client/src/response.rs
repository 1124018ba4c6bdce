//! Responses and status classification.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;

/// Status class of an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 1xx
    Informational,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// 600-999: accepted by `http` but not defined by HTTP. Not an error.
    Unknown,
}

impl StatusClass {
    /// Classifies a status code.
    pub fn of(status: StatusCode) -> Self {
        match status.as_u16() {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirection,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for 4xx and 5xx.
    pub fn is_error(self) -> bool {
        matches!(self, Self::ClientError | Self::ServerError)
    }

    /// Returns the metric label for this class.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "1xx",
            Self::Success => "2xx",
            Self::Redirection => "3xx",
            Self::ClientError => "4xx",
            Self::ServerError => "5xx",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully read response from an outbound call.
#[derive(Debug, Clone)]
pub struct HttpClientResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    request_id: String,
    attempts: u32,
}

impl HttpClientResponse {
    /// Creates a response.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        request_id: String,
        attempts: u32,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            request_id,
            attempts,
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as text, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Returns the request ID sent with the call.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns how many attempts it took to get this response.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the status class.
    pub fn class(&self) -> StatusClass {
        StatusClass::of(self.status)
    }

    /// 1xx.
    pub fn is_1xx(&self) -> bool {
        self.class() == StatusClass::Informational
    }

    /// 2xx.
    pub fn is_2xx(&self) -> bool {
        self.class() == StatusClass::Success
    }

    /// 3xx.
    pub fn is_3xx(&self) -> bool {
        self.class() == StatusClass::Redirection
    }

    /// 4xx.
    pub fn is_4xx(&self) -> bool {
        self.class() == StatusClass::ClientError
    }

    /// 5xx.
    pub fn is_5xx(&self) -> bool {
        self.class() == StatusClass::ServerError
    }

    /// 4xx or 5xx.
    pub fn is_error(&self) -> bool {
        self.class().is_error()
    }
}
