//! Common types used throughout the interceptor chain.

use bytes::Bytes;
use hermes_core::RequestContext;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

/// The HTTP request type used in the chain.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the chain.
pub type Response = http::Response<Full<Bytes>>;

/// JSON body written for errors produced by the chain itself.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// HTTP status code.
    pub http_status: u16,
    /// Human-readable message.
    pub message: String,
    /// RFC 3339 timestamp.
    pub date_time: String,
    /// Request ID, empty if none was assigned.
    pub request_id: String,
    /// Trace ID, empty if the request was not traced.
    pub trace_id: String,
}

impl ErrorEnvelope {
    /// Builds an envelope stamped with the context's identifiers.
    pub fn new(status: StatusCode, message: impl Into<String>, ctx: &RequestContext) -> Self {
        Self {
            http_status: status.as_u16(),
            message: message.into(),
            date_time: chrono::Utc::now().to_rfc3339(),
            request_id: ctx.request_id().to_string(),
            trace_id: ctx.trace_id().unwrap_or_default().to_string(),
        }
    }
}

/// Extension trait for building responses.
pub trait ResponseExt {
    /// Creates a plain-text response.
    fn text(status: StatusCode, body: impl Into<Bytes>) -> Response;

    /// Creates a JSON error response carrying an [`ErrorEnvelope`].
    fn json_error(status: StatusCode, message: &str, ctx: &RequestContext) -> Response;
}

impl ResponseExt for Response {
    fn text(status: StatusCode, body: impl Into<Bytes>) -> Response {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn json_error(status: StatusCode, message: &str, ctx: &RequestContext) -> Response {
        let envelope = ErrorEnvelope::new(status, message, ctx);
        let body = serde_json::to_vec(&envelope).unwrap_or_default();

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
