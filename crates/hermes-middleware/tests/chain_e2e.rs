//! End-to-end chain tests.
//!
//! These run requests through composed chains made of the standard
//! interceptors, plus recording and short-circuiting interceptors, and check
//! what the terminal handler and the caller observe.

use bytes::Bytes;
use hermes_core::RequestContext;
use hermes_middleware::{
    handler_fn, BoxFuture, ChainConfig, ComposedHandler, FnInterceptor, Interceptor,
    MiddlewareChain, Next, Request, RequestIdInterceptor, Response, ResponseExt,
    TenantInterceptor, TracingInterceptor, REQUEST_ID_HEADER, TENANT_HEADER,
};
use hermes_telemetry::TracerHandle;
use http::{Request as HttpRequest, StatusCode};
use http_body_util::Full;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<Vec<RequestContext>>>;

/// Creates a test request with optional headers.
fn make_request(headers: &[(&str, &str)]) -> Request {
    let mut builder = HttpRequest::builder().method("GET").uri("/accounts");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

/// Builds the standard chain around a handler that records its context.
fn standard_app() -> (ComposedHandler, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let chain = MiddlewareChain::standard(&ChainConfig::default()).unwrap();
    let app = chain.build(handler_fn(move |ctx, _req| {
        record.lock().unwrap().push(ctx);
        async { Response::text(StatusCode::OK, "OK") }
    }));
    (app, seen)
}

fn last_context(seen: &Seen) -> RequestContext {
    seen.lock().unwrap().last().cloned().unwrap()
}

/// Records entry and exit in a shared log.
struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn intercept<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("before {}", self.name));
            let response = next.run(ctx, request).await;
            self.log.lock().unwrap().push(format!("after {}", self.name));
            response
        })
    }
}

#[tokio::test]
async fn recording_interceptors_nest_outer_to_inner() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = ["a", "b", "c"].into_iter().fold(MiddlewareChain::new(), |chain, name| {
        chain.with(Recorder {
            name,
            log: log.clone(),
        })
    });
    let app = chain.build(handler_fn(|_ctx, _req| async {
        Response::text(StatusCode::OK, "OK")
    }));

    app.handle(RequestContext::new(), make_request(&[])).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["before a", "before b", "before c", "after c", "after b", "after a"]
    );
}

#[tokio::test]
async fn generated_request_id_matches_context_and_response() {
    let (app, seen) = standard_app();

    let response = app.handle(RequestContext::new(), make_request(&[])).await;

    let header_id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
    assert_eq!(header_id.len(), 32);
    assert!(header_id
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert_eq!(last_context(&seen).request_id(), header_id);
}

#[tokio::test]
async fn inbound_request_id_is_passed_through() {
    let (app, seen) = standard_app();

    let response = app
        .handle(RequestContext::new(), make_request(&[(REQUEST_ID_HEADER, "abc123")]))
        .await;

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc123");
    let ctx = last_context(&seen);
    assert_eq!(ctx.request_id(), "abc123");
    assert_eq!(ctx.logger().field("request_id"), Some("abc123"));
}

#[tokio::test]
async fn tenant_header_reaches_logger() {
    let (app, seen) = standard_app();

    app.handle(RequestContext::new(), make_request(&[(TENANT_HEADER, "acme")]))
        .await;
    app.handle(RequestContext::new(), make_request(&[])).await;

    let contexts = seen.lock().unwrap().clone();
    assert_eq!(contexts[0].logger().field("tenant"), Some("acme"));
    assert_eq!(contexts[0].tenant(), "acme");
    assert_eq!(contexts[1].logger().field("tenant"), None);
    assert_eq!(contexts[1].tenant(), "");
}

#[tokio::test]
async fn concurrent_requests_get_distinct_ids() {
    let (app, _seen) = standard_app();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let response = app.handle(RequestContext::new(), make_request(&[])).await;
            response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string()
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}

#[tokio::test]
async fn short_circuit_skips_inner_stages_but_keeps_request_id() {
    let handler_called = Arc::new(AtomicBool::new(false));
    let flag = handler_called.clone();

    let deny = FnInterceptor::new("deny", |ctx: RequestContext, _request, _next: Next<'_>| {
        Box::pin(async move { Response::json_error(StatusCode::FORBIDDEN, "tenant required", &ctx) })
    });
    let chain = MiddlewareChain::new()
        .with(RequestIdInterceptor::new())
        .with(deny)
        .with(TenantInterceptor::new());
    let app = chain.build(handler_fn(move |_ctx, _req| {
        flag.store(true, Ordering::SeqCst);
        async { Response::text(StatusCode::OK, "OK") }
    }));

    let response = app
        .handle(RequestContext::new(), make_request(&[(REQUEST_ID_HEADER, "r-403")]))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "r-403");
    assert!(!handler_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancelling_in_outer_interceptor_aborts_continuation() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();

    let cancel_soon = FnInterceptor::new("cancel_soon", |ctx: RequestContext, request, next: Next<'_>| {
        Box::pin(async move {
            let token = ctx.cancellation_token().clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel();
            });
            next.run(ctx, request).await
        })
    });
    let chain = MiddlewareChain::new()
        .with(RequestIdInterceptor::new())
        .with(cancel_soon)
        .with(TenantInterceptor::new());
    let app = chain.build(handler_fn(move |_ctx, _req| {
        let flag = flag.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
            Response::text(StatusCode::OK, "late")
        }
    }));

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        app.handle(RequestContext::new(), make_request(&[(REQUEST_ID_HEADER, "r-503")])),
    )
    .await
    .expect("chain should stop once the context is cancelled");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "r-503");
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn expired_context_still_gets_request_id() {
    let (app, seen) = standard_app();
    let ctx = RequestContext::new().with_deadline(tokio::time::Instant::now());

    let response = app
        .handle(ctx, make_request(&[(REQUEST_ID_HEADER, "abc123")]))
        .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc123");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tracing_sees_identity_and_tenant() {
    let provider = opentelemetry_sdk::trace::TracerProvider::builder().build();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let chain = MiddlewareChain::new()
        .with(RequestIdInterceptor::new())
        .with(TenantInterceptor::new())
        .with(TracingInterceptor::with_tracer(TracerHandle::from_provider(&provider)));
    let app = chain.build(handler_fn(move |ctx, _req| {
        record.lock().unwrap().push(ctx);
        async { Response::text(StatusCode::OK, "OK") }
    }));

    app.handle(
        RequestContext::new(),
        make_request(&[(REQUEST_ID_HEADER, "abc123"), (TENANT_HEADER, "acme")]),
    )
    .await;

    let ctx = last_context(&seen);
    let logger = ctx.logger();
    assert_eq!(logger.field("request_id"), Some("abc123"));
    assert_eq!(logger.field("tenant"), Some("acme"));
    assert_eq!(logger.field("trace_id"), ctx.trace_id());
    assert_eq!(logger.field("span_id"), ctx.span_id());
    assert!(ctx.trace_context().is_some());
}
