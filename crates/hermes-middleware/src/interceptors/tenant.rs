//! Tenant interceptor.
//!
//! A non-empty tenant header adds `tenant` to the context and its logger.
//! A missing or empty header leaves the context exactly as it was. A context
//! that already carries a different tenant keeps it, and the logger is tagged
//! with whichever tenant the context ends up holding. The tenant is never
//! written to the response.

use crate::error::{parse_header_name, MiddlewareError};
use crate::middleware::{BoxFuture, Interceptor, Next};
use crate::types::{Request, Response};
use hermes_core::RequestContext;
use http::HeaderName;

pub use hermes_core::TENANT_HEADER;

/// Interceptor that tags the request with its tenant.
#[derive(Debug, Clone)]
pub struct TenantInterceptor {
    header: HeaderName,
}

impl Default for TenantInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantInterceptor {
    /// Creates an interceptor using the `x-tenant` header.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: HeaderName::from_static(TENANT_HEADER),
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
}

impl Interceptor for TenantInterceptor {
    fn name(&self) -> &'static str {
        "tenant"
    }

    fn intercept<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        let tenant = request
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|tenant| !tenant.is_empty())
            .map(str::to_owned);

        let ctx = match tenant {
            Some(tenant) => {
                // The context keeps a tenant set upstream and warns on the conflict.
                let ctx = ctx.with_tenant(tenant);
                let logger = ctx.logger().with_tenant(ctx.tenant());
                ctx.with_logger(logger)
            }
            None => ctx,
        };

        Box::pin(next.run(ctx, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{handler_fn, Handler};
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use hermes_core::ContextualLogger;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::Full;
    use std::sync::{Arc, Mutex};

    fn create_request(tenant: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().uri("/test");
        if let Some(tenant) = tenant {
            builder = builder.header(TENANT_HEADER, tenant);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn capturing_handler(seen: Arc<Mutex<Option<RequestContext>>>) -> impl Handler {
        handler_fn(move |ctx, _req| {
            *seen.lock().unwrap() = Some(ctx);
            async { Response::text(StatusCode::OK, "OK") }
        })
    }

    async fn run(ctx: RequestContext, tenant: Option<&str>) -> RequestContext {
        let seen = Arc::new(Mutex::new(None));
        let handler = capturing_handler(seen.clone());
        TenantInterceptor::new()
            .intercept(ctx, create_request(tenant), Next::new(&handler))
            .await;
        let ctx = seen.lock().unwrap().take();
        ctx.unwrap()
    }

    #[tokio::test]
    async fn test_tenant_header_enriches_logger() {
        let ctx = run(RequestContext::new(), Some("acme")).await;
        assert_eq!(ctx.tenant(), "acme");
        assert_eq!(ctx.logger().field("tenant"), Some("acme"));
    }

    #[tokio::test]
    async fn test_conflicting_header_keeps_context_and_logger_in_agreement() {
        let upstream = RequestContext::new().with_tenant("acme");
        let logger = upstream.logger().with_tenant("acme");
        let ctx = run(upstream.with_logger(logger), Some("globex")).await;

        assert_eq!(ctx.tenant(), "acme");
        assert_eq!(ctx.logger().field("tenant"), Some("acme"));
    }

    #[tokio::test]
    async fn test_matching_header_is_accepted() {
        let ctx = run(RequestContext::new().with_tenant("acme"), Some("acme")).await;
        assert_eq!(ctx.tenant(), "acme");
        assert_eq!(ctx.logger().field("tenant"), Some("acme"));
    }

    #[tokio::test]
    async fn test_missing_header_adds_nothing() {
        let logger = ContextualLogger::empty().with_request_id("r1");
        let ctx = run(RequestContext::new().with_logger(logger.clone()), None).await;

        assert_eq!(ctx.tenant(), "");
        assert_eq!(ctx.logger(), &logger);
        assert_eq!(ctx.logger().field("tenant"), None);
    }

    #[tokio::test]
    async fn test_empty_header_adds_nothing() {
        let ctx = run(RequestContext::new(), Some("")).await;
        assert_eq!(ctx.tenant(), "");
        assert_eq!(ctx.logger().field("tenant"), None);
    }

    #[tokio::test]
    async fn test_tenant_not_written_to_response() {
        let handler = handler_fn(|_ctx, _req| async { Response::text(StatusCode::OK, "OK") });
        let response = TenantInterceptor::new()
            .intercept(RequestContext::new(), create_request(Some("acme")), Next::new(&handler))
            .await;
        assert!(!response.headers().contains_key(TENANT_HEADER));
    }
}
