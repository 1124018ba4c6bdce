//! The retrying HTTP client.

use crate::error::{ClientError, ClientResult};
use crate::metrics;
use crate::options::HttpClientOptions;
use crate::response::HttpClientResponse;
use crate::tls::TlsPolicy;
use bytes::Bytes;
use hermes_core::{Done, RequestContext, RequestId};
use hermes_telemetry::TracerHandle;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use reqwest::{Client, Url};
use std::future::Future;
use std::panic::Location;
use std::time::Duration;

pub use hermes_core::REQUEST_ID_HEADER;

/// HTTP client that retries, propagates request identity and trace context,
/// and honours the caller's cancellation.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ResilientHttpClient {
    client: Client,
    tls: TlsPolicy,
    settings: TransportSettings,
    request_id_header: HeaderName,
    tracer: Option<TracerHandle>,
}

#[derive(Debug, Clone, Copy)]
struct TransportSettings {
    timeout: Duration,
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
}

impl TransportSettings {
    fn build(self, tls: &TlsPolicy) -> ClientResult<Client> {
        let builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host);
        tls.apply(builder)?
            .build()
            .map_err(|e| ClientError::config(format!("failed to create client: {e}")))
    }
}

impl ResilientHttpClient {
    /// Creates a client with the given TLS policy and default settings.
    pub fn new(tls: TlsPolicy) -> ClientResult<Self> {
        Self::builder().tls(tls).build()
    }

    /// Creates a builder.
    pub fn builder() -> ResilientHttpClientBuilder {
        ResilientHttpClientBuilder::default()
    }

    /// Returns the client's TLS policy.
    pub fn tls(&self) -> &TlsPolicy {
        &self.tls
    }

    /// Makes a call, retrying as `options.retry` allows.
    ///
    /// A 4xx or 5xx answer that is not retried, or the last one after retries
    /// run out, is returned as [`ClientError::Status`] carrying the response.
    /// The call stops with [`ClientError::Cancelled`] as soon as `ctx` is
    /// cancelled or its deadline passes, dropping any attempt in flight.
    #[track_caller]
    pub fn execute<'a>(
        &'a self,
        ctx: &'a RequestContext,
        options: HttpClientOptions,
    ) -> impl Future<Output = ClientResult<HttpClientResponse>> + Send + 'a {
        let caller = Location::caller();
        self.execute_from(ctx, options, caller)
    }

    async fn execute_from(
        &self,
        ctx: &RequestContext,
        options: HttpClientOptions,
        caller: &'static Location<'static>,
    ) -> ClientResult<HttpClientResponse> {
        let method = Method::from_bytes(options.method.as_bytes()).map_err(|_| {
            ClientError::invalid_request(format!("invalid method {:?}", options.method))
        })?;
        let url = build_url(&options.url, &options.query)?;
        let (headers, request_id) = self.outbound_headers(ctx, &options.headers)?;

        let dedicated;
        let (transport, tls) = match &options.tls {
            Some(tls) => {
                dedicated = self.settings.build(tls)?;
                (&dedicated, tls)
            }
            None => (&self.client, &self.tls),
        };
        if tls.insecure_skip_verify {
            ctx.logger().warn(&format!(
                "TLS certificate verification disabled for {method} {url} called from {caller}"
            ));
        }

        let policy = &options.retry;
        let max_attempts = policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            metrics::record_attempt(method.as_str());

            let sent = send_once(transport, &method, &url, &headers, options.body.clone());
            let outcome = match ctx.run(sent).await {
                Ok(outcome) => outcome,
                Err(done) => return Err(abort(ctx, &method, &url, done)),
            };
            let attempts_left = attempt < max_attempts;

            match outcome {
                Ok((status, response_headers, body)) => {
                    let response = HttpClientResponse::new(
                        status,
                        response_headers,
                        body,
                        request_id.clone(),
                        attempt,
                    );
                    if !response.is_error() {
                        metrics::record_response(method.as_str(), response.class());
                        return Ok(response);
                    }
                    if !(attempts_left && policy.should_retry_status(status)) {
                        metrics::record_response(method.as_str(), response.class());
                        return Err(ClientError::Status(Box::new(response)));
                    }
                    ctx.logger().debug(&format!(
                        "attempt {attempt}/{max_attempts} for {method} {url} got {status}, retrying"
                    ));
                }
                Err(source) if source.is_builder() => {
                    return Err(ClientError::invalid_request(source.to_string()));
                }
                Err(source) => {
                    if !attempts_left {
                        metrics::record_outcome(method.as_str(), "transport_error");
                        ctx.logger().error(&format!(
                            "{method} {url} failed after {attempt} attempt(s): {source}"
                        ));
                        return Err(ClientError::Transport {
                            attempts: attempt,
                            source,
                        });
                    }
                    ctx.logger().warn(&format!(
                        "attempt {attempt}/{max_attempts} for {method} {url} failed: {source}"
                    ));
                }
            }

            if let Err(done) = ctx.run(tokio::time::sleep(policy.backoff(attempt))).await {
                return Err(abort(ctx, &method, &url, done));
            }
        }
    }

    /// Builds outbound headers and resolves the request ID to send.
    fn outbound_headers(
        &self,
        ctx: &RequestContext,
        extra: &[(String, String)],
    ) -> ClientResult<(HeaderMap, String)> {
        let mut headers = HeaderMap::with_capacity(extra.len() + 3);
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::invalid_request(format!("header {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::invalid_request(format!("header {name}: {e}")))?;
            headers.append(name, value);
        }

        let request_id = if ctx.has_request_id() {
            ctx.request_id().to_owned()
        } else {
            RequestId::generate().to_string()
        };
        let value = HeaderValue::from_str(&request_id)
            .map_err(|e| ClientError::invalid_request(format!("request id: {e}")))?;
        headers.insert(self.request_id_header.clone(), value);

        if let (Some(handle), Some(cx)) = (self.tracer(), ctx.trace_context()) {
            handle.inject(cx, &mut headers);
        }

        Ok((headers, request_id))
    }

    fn tracer(&self) -> Option<&TracerHandle> {
        match &self.tracer {
            Some(handle) => Some(handle),
            None => hermes_telemetry::registered_tracer(),
        }
    }
}

fn abort(ctx: &RequestContext, method: &Method, url: &Url, done: Done) -> ClientError {
    metrics::record_outcome(method.as_str(), "cancelled");
    ctx.logger().warn(&format!("{method} {url} aborted: {done}"));
    ClientError::Cancelled(done)
}

fn build_url(raw: &str, query: &[(String, String)]) -> ClientResult<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| ClientError::invalid_request(format!("invalid URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::invalid_request(format!(
            "unsupported URL scheme {:?}",
            url.scheme()
        )));
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

async fn send_once(
    client: &Client,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: Option<Bytes>,
) -> Result<(StatusCode, HeaderMap, Bytes), reqwest::Error> {
    let mut request = client
        .request(method.clone(), url.clone())
        .headers(headers.clone());
    if let Some(body) = body {
        request = request.body(body);
    }
    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok((status, headers, body))
}

/// Builder for [`ResilientHttpClient`].
#[derive(Debug, Clone)]
pub struct ResilientHttpClientBuilder {
    tls: TlsPolicy,
    settings: TransportSettings,
    request_id_header: String,
    tracer: Option<TracerHandle>,
}

impl Default for ResilientHttpClientBuilder {
    fn default() -> Self {
        Self {
            tls: TlsPolicy::default(),
            settings: TransportSettings {
                timeout: Duration::from_secs(30),
                connect_timeout: Duration::from_secs(10),
                pool_max_idle_per_host: 100,
            },
            request_id_header: REQUEST_ID_HEADER.to_string(),
            tracer: None,
        }
    }
}

impl ResilientHttpClientBuilder {
    /// Sets the TLS policy.
    #[must_use]
    pub fn tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the timeout for a single attempt.
    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = timeout;
        self
    }

    /// Sets the idle connection limit per host.
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.settings.pool_max_idle_per_host = max;
        self
    }

    /// Sets the header used to send the request ID.
    #[must_use]
    pub fn request_id_header(mut self, name: impl Into<String>) -> Self {
        self.request_id_header = name.into();
        self
    }

    /// Uses the given tracer instead of the process-wide registration.
    #[must_use]
    pub fn tracer(mut self, handle: TracerHandle) -> Self {
        self.tracer = Some(handle);
        self
    }

    /// Builds the client, loading TLS material once.
    pub fn build(self) -> ClientResult<ResilientHttpClient> {
        metrics::describe();
        let request_id_header = HeaderName::from_bytes(self.request_id_header.as_bytes())
            .map_err(|e| {
                ClientError::config(format!(
                    "invalid request id header {:?}: {e}",
                    self.request_id_header
                ))
            })?;
        let client = self.settings.build(&self.tls)?;
        Ok(ResilientHttpClient {
            client,
            tls: self.tls,
            settings: self.settings,
            request_id_header,
            tracer: self.tracer,
        })
    }
}
