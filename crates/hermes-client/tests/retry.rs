//! Retry, propagation and cancellation against live local servers.

mod common;

use hermes_client::{
    ClientError, HttpClientOptions, ResilientHttpClient, RetryPolicy, TlsPolicy,
    REQUEST_ID_HEADER, TENANT_HEADER,
};
use hermes_core::{Done, RequestContext};
use hermes_telemetry::TracerHandle;
use opentelemetry::trace::{TraceContextExt, Tracer};
use std::time::Duration;

fn client() -> ResilientHttpClient {
    ResilientHttpClient::new(TlsPolicy::default()).unwrap()
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(max_attempts)
        .with_backoff(Duration::from_millis(5), Duration::from_millis(20))
}

#[tokio::test]
async fn retries_listed_status_until_success() {
    let server = common::serve(&[503, 503, 200]).await;
    let options = HttpClientOptions::get(server.url("/accounts"))
        .retry(fast_retry(3).with_retryable_status_codes([503]));

    let response = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap();

    assert!(response.is_2xx());
    assert_eq!(response.attempts(), 3);
    assert_eq!(response.body_as_string(), "status 200");
    assert_eq!(server.script.hits(), 3);
}

#[tokio::test]
async fn unlisted_status_is_returned_after_one_attempt() {
    let server = common::serve(&[404]).await;
    let options = HttpClientOptions::get(server.url("/accounts/9"))
        .retry(fast_retry(3).with_retryable_status_codes([503]));

    let err = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap_err();

    let response = err.response().expect("status errors carry the response");
    assert!(response.is_4xx());
    assert_eq!(response.attempts(), 1);
    assert_eq!(err.to_string(), "got 404 Not Found: status 404");
    assert_eq!(server.script.hits(), 1);
}

#[tokio::test]
async fn empty_status_set_retries_client_errors() {
    let server = common::serve(&[429, 429, 200]).await;
    let options = HttpClientOptions::get(server.url("/")).retry(fast_retry(5));

    let response = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap();

    assert_eq!(response.attempts(), 3);
    assert_eq!(server.script.hits(), 3);
}

#[tokio::test]
async fn last_response_is_returned_when_attempts_run_out() {
    let server = common::serve(&[503]).await;
    let options = HttpClientOptions::get(server.url("/")).retry(fast_retry(2));

    let err = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.response().unwrap().attempts(), 2);
    assert_eq!(server.script.hits(), 2);
}

#[tokio::test]
async fn redirect_class_is_not_an_error() {
    let server = common::serve(&[304]).await;
    let options = HttpClientOptions::get(server.url("/")).retry(fast_retry(3));

    let response = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap();

    assert!(response.is_3xx());
    assert_eq!(server.script.hits(), 1);
}

#[tokio::test]
async fn transport_failures_are_retried_then_reported() {
    let addr = common::closed_port().await;
    let options = HttpClientOptions::get(format!("http://{addr}/")).retry(fast_retry(3));

    let err = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap_err();

    match err {
        ClientError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn request_id_and_tenant_are_propagated() {
    let server = common::serve(&[200]).await;
    let ctx = RequestContext::new().with_request_id("abc123").with_tenant("acme");
    let options = HttpClientOptions::get(server.url("/")).with_tenant(ctx.tenant());

    let response = client().execute(&ctx, options).await.unwrap();

    let seen = server.script.seen();
    assert_eq!(seen[0][REQUEST_ID_HEADER], "abc123");
    assert_eq!(seen[0][TENANT_HEADER], "acme");
    assert_eq!(response.request_id(), "abc123");
}

#[tokio::test]
async fn tenant_is_not_synthesized() {
    let server = common::serve(&[200]).await;
    let ctx = RequestContext::new().with_tenant("acme");

    client()
        .execute(&ctx, HttpClientOptions::get(server.url("/")))
        .await
        .unwrap();

    assert!(!server.script.seen()[0].contains_key(TENANT_HEADER));
}

#[tokio::test]
async fn missing_request_id_is_generated_once_per_call() {
    let server = common::serve(&[500, 200]).await;
    let options = HttpClientOptions::get(server.url("/")).retry(fast_retry(2));

    let response = client()
        .execute(&RequestContext::new(), options)
        .await
        .unwrap();

    let seen = server.script.seen();
    let id = response.request_id();
    assert_eq!(id.len(), 32);
    assert_eq!(seen[0][REQUEST_ID_HEADER], id);
    assert_eq!(seen[1][REQUEST_ID_HEADER], id);
}

#[tokio::test]
async fn active_span_is_injected() {
    let server = common::serve(&[200]).await;
    let provider = opentelemetry_sdk::trace::TracerProvider::builder().build();
    let handle = TracerHandle::from_provider(&provider);
    let span = handle.tracer().start("outbound");
    let cx = opentelemetry::Context::new().with_span(span);
    let trace_id = cx.span().span_context().trace_id().to_string();
    let ctx = RequestContext::new().with_trace_context(cx);

    let client = ResilientHttpClient::builder().tracer(handle).build().unwrap();
    client
        .execute(&ctx, HttpClientOptions::get(server.url("/")))
        .await
        .unwrap();

    let seen = server.script.seen();
    let traceparent = seen[0]["traceparent"].to_str().unwrap();
    assert!(traceparent.contains(&trace_id), "{traceparent}");
}

#[tokio::test]
async fn cancellation_aborts_in_flight_attempt() {
    let server = common::serve_slow(Duration::from_secs(30)).await;
    let ctx = RequestContext::new();
    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client().execute(&ctx, HttpClientOptions::get(server.url("/"))),
    )
    .await
    .expect("call should stop once the context is cancelled");

    assert!(matches!(result, Err(ClientError::Cancelled(Done::Cancelled))));
    assert_eq!(server.script.hits(), 1);
}

#[tokio::test]
async fn deadline_interrupts_backoff() {
    let server = common::serve(&[503]).await;
    let ctx = RequestContext::new().with_timeout(Duration::from_millis(200));
    let options = HttpClientOptions::get(server.url("/")).retry(
        RetryPolicy::default()
            .with_max_attempts(5)
            .with_backoff(Duration::from_secs(20), Duration::from_secs(20)),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), client().execute(&ctx, options))
        .await
        .expect("deadline should end the backoff sleep");

    assert!(matches!(
        result,
        Err(ClientError::Cancelled(Done::DeadlineExceeded))
    ));
    assert_eq!(server.script.hits(), 1);
}
