//! Tracing interceptor.
//!
//! When a tracer is available, each request gets a server span:
//!
//! 1. Upstream span context is extracted from the inbound headers. No parent
//!    is not an error; the span becomes a trace root.
//! 2. The span is named after the request path and tagged with
//!    `request.id`, `tenant` (empty string when unset) and the HTTP method.
//! 3. Trace and span IDs go onto the context and its logger, and the span
//!    itself is attached so outbound calls can continue the trace.
//! 4. The span ends when the continuation finishes, on every path. An
//!    aborted or panicking continuation still ends it through a drop guard.
//!
//! Without a tracer the interceptor passes requests through untouched.

use crate::middleware::{BoxFuture, Interceptor, Next};
use crate::types::{Request, Response};
use hermes_core::RequestContext;
use hermes_telemetry::TracerHandle;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_PATH,
};

/// Span attribute carrying the request ID.
pub const REQUEST_ID_ATTRIBUTE: &str = "request.id";

/// Span attribute carrying the tenant.
pub const TENANT_ATTRIBUTE: &str = "tenant";

#[derive(Debug, Clone)]
enum TracerSource {
    Global,
    Explicit(TracerHandle),
}

/// Interceptor that starts a server span per request.
#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    source: TracerSource,
}

impl TracingInterceptor {
    /// Uses the process-wide tracer, looked up per request.
    ///
    /// Requests are passed through while no tracer is registered.
    #[must_use]
    pub fn from_global() -> Self {
        Self {
            source: TracerSource::Global,
        }
    }

    /// Uses the given tracer.
    #[must_use]
    pub fn with_tracer(handle: TracerHandle) -> Self {
        Self {
            source: TracerSource::Explicit(handle),
        }
    }

    fn handle(&self) -> Option<&TracerHandle> {
        match &self.source {
            TracerSource::Global => hermes_telemetry::registered_tracer(),
            TracerSource::Explicit(handle) => Some(handle),
        }
    }
}

/// Ends the span when dropped.
struct SpanGuard(opentelemetry::Context);

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.0.span().end();
    }
}

impl Interceptor for TracingInterceptor {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn intercept<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        let Some(handle) = self.handle() else {
            return Box::pin(next.run(ctx, request));
        };

        let parent = handle.extract(request.headers());
        let path = request.uri().path().to_owned();
        let span = handle
            .tracer()
            .span_builder(path.clone())
            .with_kind(SpanKind::Server)
            .with_attributes(vec![
                KeyValue::new(REQUEST_ID_ATTRIBUTE, ctx.request_id().to_owned()),
                KeyValue::new(TENANT_ATTRIBUTE, ctx.tenant().to_owned()),
                KeyValue::new(HTTP_REQUEST_METHOD, request.method().as_str().to_owned()),
                KeyValue::new(URL_PATH, path),
            ])
            .start_with_context(handle.tracer(), &parent);
        let cx = parent.with_span(span);

        let span_context = cx.span().span_context().clone();
        let trace_id = span_context.trace_id().to_string();
        let span_id = span_context.span_id().to_string();

        let logger = ctx.logger().with_tracing(trace_id.as_str(), span_id.as_str());
        let ctx = ctx
            .with_tracing(&trace_id, &span_id)
            .with_logger(logger)
            .with_trace_context(cx.clone());

        let guard = SpanGuard(cx);
        Box::pin(async move {
            let response = next.run(ctx, request).await;

            let status = response.status();
            let span = guard.0.span();
            span.set_attribute(KeyValue::new(
                HTTP_RESPONSE_STATUS_CODE,
                i64::from(status.as_u16()),
            ));
            if status.is_server_error() {
                span.set_status(Status::error(status.to_string()));
            }
            drop(guard);
            response
        })
    }
}
