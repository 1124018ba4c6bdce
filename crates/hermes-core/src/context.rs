//! Request context types.
//!
//! The [`RequestContext`] carries per-request state through the interceptor
//! chain, into handlers and out through the HTTP client. It is immutable:
//! every `with_*` method consumes the context and returns a derived one.
//!
//! Enrichment is monotonic. Once `request_id`, `tenant`, `trace_id` or
//! `span_id` is set, derived contexts keep the original value. An attempt to
//! overwrite it with a different value is ignored and logged at warn level.

use crate::logger::ContextualLogger;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A request identifier.
///
/// Inbound identifiers are carried verbatim. Generated identifiers are a
/// random UUID v4 (122 random bits) rendered as 32 lowercase hex characters
/// with no separators.
///
/// # Example
///
/// ```
/// use hermes_core::RequestId;
///
/// let id = RequestId::generate();
/// assert_eq!(id.as_str().len(), 32);
/// assert!(id.as_str().chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generates a fresh request ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why a context stopped accepting work.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    /// The context's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,
    /// The context's deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Per-request context that flows through the interceptor chain.
///
/// Getters never fail: absent string values read as `""` and an absent
/// logger reads as the process root logger.
///
/// # Example
///
/// ```
/// use hermes_core::RequestContext;
///
/// let ctx = RequestContext::new()
///     .with_request_id("abc123")
///     .with_tenant("acme");
///
/// assert_eq!(ctx.request_id(), "abc123");
/// assert_eq!(ctx.tenant(), "acme");
///
/// // The original identifier is never replaced.
/// let ctx = ctx.with_request_id("other");
/// assert_eq!(ctx.request_id(), "abc123");
/// ```
#[derive(Clone)]
pub struct RequestContext {
    request_id: Option<RequestId>,
    tenant: Option<Arc<str>>,
    trace_id: Option<Arc<str>>,
    span_id: Option<Arc<str>>,
    logger: Option<ContextualLogger>,

    /// Active OpenTelemetry context, holding the request's span.
    trace_context: Option<opentelemetry::Context>,

    cancel: CancellationToken,
    deadline: Option<Instant>,
    started_at: Instant,
}

impl RequestContext {
    /// Creates an empty context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: None,
            tenant: None,
            trace_id: None,
            span_id: None,
            logger: None,
            trace_context: None,
            cancel: CancellationToken::new(),
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID, or `""` if none is set.
    pub fn request_id(&self) -> &str {
        self.request_id.as_ref().map_or("", RequestId::as_str)
    }

    /// Returns `true` if a request ID is set.
    pub fn has_request_id(&self) -> bool {
        self.request_id.is_some()
    }

    /// Returns a context carrying `request_id`.
    ///
    /// Empty IDs are ignored.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<RequestId>) -> Self {
        let request_id = request_id.into();
        if request_id.as_str().is_empty() {
            return self;
        }
        match &self.request_id {
            Some(existing) if *existing != request_id => {
                reject_overwrite("request_id", existing.as_str(), request_id.as_str());
            }
            Some(_) => {}
            None => self.request_id = Some(request_id),
        }
        self
    }

    /// Returns the tenant, or `""` if none is set.
    pub fn tenant(&self) -> &str {
        self.tenant.as_deref().unwrap_or("")
    }

    /// Returns a context carrying `tenant`.
    ///
    /// Empty tenants are ignored.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl AsRef<str>) -> Self {
        set_once(&mut self.tenant, "tenant", tenant.as_ref());
        self
    }

    /// Returns the trace ID if set.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Returns the span ID if set.
    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    /// Returns a context carrying trace and span IDs.
    #[must_use]
    pub fn with_tracing(mut self, trace_id: impl AsRef<str>, span_id: impl AsRef<str>) -> Self {
        set_once(&mut self.trace_id, "trace_id", trace_id.as_ref());
        set_once(&mut self.span_id, "span_id", span_id.as_ref());
        self
    }

    /// Returns the attached logger, or the root logger if none is attached.
    pub fn logger(&self) -> &ContextualLogger {
        match &self.logger {
            Some(logger) => logger,
            None => ContextualLogger::root(),
        }
    }

    /// Returns a context carrying `logger`.
    ///
    /// The logger is replaced rather than kept, since each stage attaches a
    /// logger derived from the previous one.
    #[must_use]
    pub fn with_logger(mut self, logger: ContextualLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the active OpenTelemetry context, if a span is attached.
    pub fn trace_context(&self) -> Option<&opentelemetry::Context> {
        self.trace_context.as_ref()
    }

    /// Returns a context carrying the OpenTelemetry context of an active span.
    #[must_use]
    pub fn with_trace_context(mut self, cx: opentelemetry::Context) -> Self {
        if self.trace_context.is_some() {
            tracing::warn!(key = "trace_context", "request context key already set, keeping original");
        } else {
            self.trace_context = Some(cx);
        }
        self
    }

    /// Returns the cancellation token shared by this context's lineage.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns a context driven by `token` instead of its own.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the deadline if set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns a context with `deadline`. An earlier existing deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Returns a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns `true` once the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Done {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.cancel.cancelled() => Done::Cancelled,
                () = tokio::time::sleep_until(deadline) => Done::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                Done::Cancelled
            }
        }
    }

    /// Returns `Err` with the reason if the context is already done.
    pub fn check(&self) -> Result<(), Done> {
        if self.cancel.is_cancelled() {
            Err(Done::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Err(Done::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Runs `fut` until it completes or the context is done.
    ///
    /// A context that is already done never polls `fut`. Otherwise `fut` is
    /// polled before the context on every wake-up, so nested runs on the
    /// same context resolve innermost first. When the context finishes
    /// first, `fut` is dropped, aborting whatever work it had in flight.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Done> {
        self.check()?;
        tokio::select! {
            biased;
            out = fut => Ok(out),
            done = self.done() => Err(done),
        }
    }

    /// Returns the time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id())
            .field("tenant", &self.tenant())
            .field("trace_id", &self.trace_id)
            .field("span_id", &self.span_id)
            .field("logger", &self.logger)
            .field("has_span", &self.trace_context.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

fn set_once(slot: &mut Option<Arc<str>>, key: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    match slot {
        Some(existing) if **existing != *value => reject_overwrite(key, &**existing, value),
        Some(_) => {}
        None => *slot = Some(value.into()),
    }
}

fn reject_overwrite(key: &'static str, existing: &str, rejected: &str) {
    tracing::warn!(
        key,
        existing,
        rejected,
        "request context key already set, keeping original"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_generated_format(id: &str) -> bool {
        id.len() == 32
            && id
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
    }

    #[test]
    fn test_request_id_generate_format() {
        let id = RequestId::generate();
        assert!(is_generated_format(id.as_str()), "bad id: {id}");
    }

    #[test]
    fn test_request_id_generate_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_request_context_new_defaults() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.request_id(), "");
        assert_eq!(ctx.tenant(), "");
        assert!(ctx.trace_id().is_none());
        assert!(ctx.span_id().is_none());
        assert!(ctx.trace_context().is_none());
        assert!(!ctx.is_done());
        assert_eq!(ctx.logger(), ContextualLogger::root());
    }

    #[test]
    fn test_request_context_builder_pattern() {
        let ctx = RequestContext::new()
            .with_request_id("abc123")
            .with_tenant("acme")
            .with_tracing("t1", "s1");

        assert_eq!(ctx.request_id(), "abc123");
        assert_eq!(ctx.tenant(), "acme");
        assert_eq!(ctx.trace_id(), Some("t1"));
        assert_eq!(ctx.span_id(), Some("s1"));
    }

    #[test]
    fn test_enrichment_keeps_original_values() {
        let ctx = RequestContext::new()
            .with_request_id("first")
            .with_tenant("acme")
            .with_request_id("second")
            .with_tenant("globex")
            .with_tracing("t1", "s1")
            .with_tracing("t2", "s2");

        assert_eq!(ctx.request_id(), "first");
        assert_eq!(ctx.tenant(), "acme");
        assert_eq!(ctx.trace_id(), Some("t1"));
        assert_eq!(ctx.span_id(), Some("s1"));
    }

    #[test]
    fn test_empty_values_are_not_set() {
        let ctx = RequestContext::new().with_request_id("").with_tenant("");
        assert!(!ctx.has_request_id());
        assert_eq!(ctx.tenant(), "");

        let ctx = ctx.with_tenant("acme");
        assert_eq!(ctx.tenant(), "acme");
    }

    #[test]
    fn test_derived_context_does_not_affect_parent() {
        let parent = RequestContext::new().with_request_id("r1");
        let child = parent.clone().with_tenant("acme");

        assert_eq!(parent.tenant(), "");
        assert_eq!(child.tenant(), "acme");
        assert_eq!(child.request_id(), "r1");
    }

    #[test]
    fn test_logger_is_replaced_by_derived_logger() {
        let ctx = RequestContext::new()
            .with_logger(ContextualLogger::empty().with_request_id("r1"));
        let next = ctx.logger().with_tenant("acme");
        let ctx = ctx.with_logger(next);

        assert_eq!(ctx.logger().field("request_id"), Some("r1"));
        assert_eq!(ctx.logger().field("tenant"), Some("acme"));
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = RequestContext::new()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel_is_shared_with_clones() {
        let ctx = RequestContext::new();
        let derived = ctx.clone().with_request_id("r1");
        ctx.cancel();
        assert!(derived.is_done());
    }

    #[tokio::test]
    async fn test_done_reports_cancellation() {
        let ctx = RequestContext::new();
        let token = ctx.cancellation_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        assert_eq!(ctx.done().await, Done::Cancelled);
    }

    #[test]
    fn test_done_pending_until_cancelled() {
        let ctx = RequestContext::new();
        let mut done = tokio_test::task::spawn(ctx.done());
        tokio_test::assert_pending!(done.poll());

        ctx.cancel();

        assert!(done.is_woken());
        assert_eq!(tokio_test::assert_ready!(done.poll()), Done::Cancelled);
    }

    #[tokio::test]
    async fn test_done_reports_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        assert_eq!(ctx.done().await, Done::DeadlineExceeded);
        assert!(ctx.is_done());
    }

    #[test]
    fn test_check_reports_reason() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.check(), Ok(()));

        let expired = RequestContext::new().with_deadline(Instant::now());
        assert_eq!(expired.check(), Err(Done::DeadlineExceeded));

        ctx.cancel();
        assert_eq!(ctx.check(), Err(Done::Cancelled));
    }

    #[tokio::test]
    async fn test_run_skips_future_when_already_done() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let polled = std::sync::atomic::AtomicBool::new(false);
        let out = ctx
            .run(async { polled.store(true, std::sync::atomic::Ordering::SeqCst) })
            .await;
        assert_eq!(out, Err(Done::Cancelled));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
        let out = ctx.run(async { 42 }).await;
        assert_eq!(out, Ok(42));
    }

    #[tokio::test]
    async fn test_run_aborts_on_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        let out = ctx
            .run(tokio::time::sleep(Duration::from_secs(30)))
            .await;
        assert_eq!(out, Err(Done::DeadlineExceeded));
    }

    proptest! {
        #[test]
        fn prop_first_request_id_is_kept(ids in proptest::collection::vec("[a-z0-9]{0,8}", 1..8)) {
            let ctx = ids
                .iter()
                .fold(RequestContext::new(), |ctx, id| ctx.with_request_id(id.as_str()));
            let expected = ids.iter().find(|id| !id.is_empty()).map_or("", String::as_str);
            prop_assert_eq!(ctx.request_id(), expected);
        }
    }
}
