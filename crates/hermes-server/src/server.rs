//! HTTP server.
//!
//! Every request gets a fresh [`RequestContext`] and runs through the
//! composed middleware chain. Connections are plain HTTP/1.1, or HTTPS when
//! the config carries a certificate. On shutdown the server:
//!
//! 1. stops accepting connections
//! 2. asks each open connection to finish its current request and close
//! 3. waits for them, up to the configured shutdown timeout
//! 4. returns

use crate::config::ServerConfig;
use crate::error::{ConfigError, ServerError, ServerResult};
use crate::shutdown::{trap, ConnectionTracker, ShutdownCallback, ShutdownSignal, Signal};
use hermes_core::{RequestContext, RequestId};
use hermes_middleware::{ComposedHandler, Handler, MiddlewareChain, Response, ResponseExt};
use http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// An HTTP/1.1 server in front of a composed chain.
pub struct HttpServer {
    config: ServerConfig,
    app: ComposedHandler,
    on_shutdown: Option<ShutdownCallback>,
}

impl HttpServer {
    /// Creates a server for an already composed chain.
    pub fn new(config: ServerConfig, app: ComposedHandler) -> Self {
        Self {
            config,
            app,
            on_shutdown: None,
        }
    }

    /// Creates a server running the standard chain around `terminal`.
    pub fn standard(config: ServerConfig, terminal: impl Handler) -> ServerResult<Self> {
        let chain = MiddlewareChain::standard(&config.chain)?;
        let app = chain.build(terminal);
        Ok(Self::new(config, app))
    }

    /// Sets the callback run once when the first shutdown signal arrives.
    #[must_use]
    pub fn on_shutdown<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Signal) -> anyhow::Result<()> + Send + 'static,
    {
        self.on_shutdown = Some(Box::new(callback));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Loads TLS material and binds the listener without serving yet.
    pub async fn bind(self) -> ServerResult<BoundServer> {
        let addr = self.config.socket_addr()?;
        let request_id_header = HeaderName::from_bytes(self.config.chain.request_id_header.as_bytes())
            .map_err(|e| {
                ConfigError::Invalid(format!(
                    "chain.request_id_header {:?}: {e}",
                    self.config.chain.request_id_header
                ))
            })?;
        let tls = self
            .config
            .tls
            .as_ref()
            .map(crate::tls::ServerTlsConfig::acceptor)
            .transpose()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let serving = Arc::new(Serving {
            app: self.app,
            request_timeout: self.config.request_timeout(),
            request_id_header,
        });

        Ok(BoundServer {
            listener,
            local_addr,
            tls,
            config: self.config,
            serving,
            on_shutdown: self.on_shutdown,
        })
    }

    /// Binds, traps the configured signals and serves until one arrives.
    pub async fn start(self) -> ServerResult<()> {
        self.bind().await?.start().await
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("config", &self.config)
            .field("on_shutdown", &self.on_shutdown.is_some())
            .finish_non_exhaustive()
    }
}

/// A server whose listener is bound.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
    config: ServerConfig,
    serving: Arc<Serving>,
    on_shutdown: Option<ShutdownCallback>,
}

impl BoundServer {
    /// The address actually bound, useful with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns `true` if connections are served over TLS.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Traps the configured signals and serves until one arrives.
    pub async fn start(mut self) -> ServerResult<()> {
        let signals = self.config.signals()?;
        let callback = self
            .on_shutdown
            .take()
            .unwrap_or_else(|| Box::new(|_| Ok(())));
        let shutdown = trap(&signals, callback)?;
        self.run(shutdown).await
    }

    /// Serves until `shutdown` closes.
    ///
    /// The shutdown callback is not used here; whoever closes `shutdown` owns
    /// that step.
    pub async fn run(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let Self {
            listener,
            local_addr,
            tls,
            config,
            serving,
            ..
        } = self;
        let tracker = ConnectionTracker::new();

        tracing::info!(addr = %local_addr, tls = tls.is_some(), "server listening");

        let closing = shutdown.recv();
        tokio::pin!(closing);
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let serving = Arc::clone(&serving);
                            let tls = tls.clone();
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                match tls {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(stream) => {
                                            serve_connection(serving, stream, remote_addr, shutdown).await;
                                        }
                                        Err(e) => {
                                            tracing::debug!(remote = %remote_addr, error = %e, "TLS handshake failed");
                                        }
                                    },
                                    None => serve_connection(serving, stream, remote_addr, shutdown).await,
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                () = &mut closing => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        let timeout = config.shutdown_timeout();
        tracing::info!(
            timeout = ?timeout,
            connections = tracker.active_connections(),
            "waiting for open connections"
        );

        tokio::select! {
            () = tracker.wait_for_idle() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    connections = tracker.active_connections(),
                    "shutdown timeout reached with connections still open"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

impl fmt::Debug for BoundServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundServer")
            .field("local_addr", &self.local_addr)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-request settings shared by every connection.
struct Serving {
    app: ComposedHandler,
    request_timeout: Option<Duration>,
    request_id_header: HeaderName,
}

async fn serve_connection<I>(
    serving: Arc<Serving>,
    stream: I,
    remote_addr: SocketAddr,
    shutdown: ShutdownSignal,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request: Request<Incoming>| {
        let serving = Arc::clone(&serving);
        async move { Ok::<_, Infallible>(serving.handle(request).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let closing = shutdown.recv();
    tokio::pin!(closing);
    let mut draining = false;
    let result = loop {
        tokio::select! {
            result = conn.as_mut() => break result,
            () = &mut closing, if !draining => {
                tracing::debug!(remote = %remote_addr, "draining connection");
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };

    if let Err(e) = result {
        tracing::debug!(remote = %remote_addr, error = %e, "connection error");
    }
}

impl Serving {
    /// Reads the body, then runs the chain. The request deadline starts once
    /// the body is in hand.
    async fn handle(&self, request: Request<Incoming>) -> Response {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return unreadable_body(&parts.headers, &self.request_id_header);
            }
        };

        let mut ctx = RequestContext::new();
        if let Some(timeout) = self.request_timeout {
            ctx = ctx.with_timeout(timeout);
        }
        self.app
            .handle(ctx, Request::from_parts(parts, Full::new(body)))
            .await
    }
}

/// The `400` sent when the body cannot be read, carrying the caller's
/// request ID (or a fresh one) like any response from the chain.
fn unreadable_body(headers: &HeaderMap, request_id_header: &HeaderName) -> Response {
    let request_id = headers
        .get(request_id_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(RequestId::generate, RequestId::from);
    let ctx = RequestContext::new().with_request_id(request_id);

    let mut response =
        Response::json_error(StatusCode::BAD_REQUEST, "failed to read request body", &ctx);
    if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
        response
            .headers_mut()
            .insert(request_id_header.clone(), value);
    }
    response
}
