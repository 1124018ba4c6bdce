//! Per-call options.

use crate::retry::RetryPolicy;
use crate::tls::TlsPolicy;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;

pub use hermes_core::TENANT_HEADER;

/// Everything needed to make one outbound call.
///
/// Method and URL are kept as text and validated when the call starts, so a
/// malformed value fails before any attempt is made.
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    /// HTTP method, e.g. `"GET"`.
    pub method: String,
    /// Absolute `http` or `https` URL.
    pub url: String,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Bytes>,
    /// Retry policy for this call.
    pub retry: RetryPolicy,
    /// TLS policy for this call only. Builds a dedicated transport.
    pub tls: Option<TlsPolicy>,
}

impl HttpClientOptions {
    /// Creates options for the given method and URL with the default retry
    /// policy.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            retry: RetryPolicy::default(),
            tls: None,
        }
    }

    /// A `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// A `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// A `PUT` request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new("PUT", url)
    }

    /// A `DELETE` request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("DELETE", url)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Forwards a tenant tag.
    #[must_use]
    pub fn with_tenant(self, tenant: impl Into<String>) -> Self {
        self.header(TENANT_HEADER, tenant)
    }

    /// Sets HTTP Basic credentials.
    #[must_use]
    pub fn with_basic(self, username: &str, password: &str) -> Self {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        self.header(http::header::AUTHORIZATION.as_str(), format!("Basic {credentials}"))
    }

    /// Sets a bearer token.
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.header(http::header::AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    /// Asks for a JSON response.
    #[must_use]
    pub fn accept_json(self) -> Self {
        self.header(http::header::ACCEPT.as_str(), "application/json")
    }

    /// Sets a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets the content type.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header(http::header::CONTENT_TYPE.as_str(), "application/json")
            .body(body))
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Uses a dedicated TLS policy for this call.
    #[must_use]
    pub fn tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = Some(tls);
        self
    }
}
