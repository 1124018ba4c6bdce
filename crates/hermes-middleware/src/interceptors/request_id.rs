//! Request ID interceptor.
//!
//! Reads the request ID header and falls back to a freshly generated ID when
//! the header is missing, empty or not valid text. The ID is stored on the
//! context and its logger, and always written back on the response under the
//! same header name, including responses produced by inner stages that
//! short-circuit.

use crate::error::{parse_header_name, MiddlewareError};
use crate::middleware::{BoxFuture, Interceptor, Next};
use crate::types::{Request, Response};
use hermes_core::{RequestContext, RequestId};
use http::{HeaderName, HeaderValue};

pub use hermes_core::REQUEST_ID_HEADER;

/// Interceptor that extracts or generates request IDs.
#[derive(Debug, Clone)]
pub struct RequestIdInterceptor {
    header: HeaderName,
}

impl Default for RequestIdInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdInterceptor {
    /// Creates an interceptor using the `x-request-id` header.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: HeaderName::from_static(REQUEST_ID_HEADER),
        }
    }

    /// Creates an interceptor using a custom header name.
    pub fn with_header(name: &str) -> Result<Self, MiddlewareError> {
        Ok(Self {
            header: parse_header_name(name)?,
        })
    }

    /// Returns the header name.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    fn inbound_id(&self, request: &Request) -> Option<RequestId> {
        request
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(RequestId::from)
    }
}

impl Interceptor for RequestIdInterceptor {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn intercept<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = self
                .inbound_id(&request)
                .unwrap_or_else(RequestId::generate);

            let ctx = ctx.with_request_id(request_id);
            let request_id = ctx.request_id().to_string();
            let logger = ctx.logger().with_request_id(request_id.as_str());
            let ctx = ctx.with_logger(logger);

            let mut response = next.run(ctx, request).await;

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(self.header.clone(), value);
            }
            response
        })
    }
}
