//! Scripted HTTP servers for client tests.

#![allow(dead_code)]

use bytes::Bytes;
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Answers with a fixed sequence of statuses; the last one repeats.
pub struct Script {
    statuses: Vec<u16>,
    delay: Option<Duration>,
    hits: AtomicUsize,
    seen: Mutex<Vec<HeaderMap>>,
}

impl Script {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Headers of every request received, in order.
    pub fn seen(&self) -> Vec<HeaderMap> {
        self.seen.lock().unwrap().clone()
    }

    async fn respond(&self, request: Request<Incoming>) -> Response<Full<Bytes>> {
        let n = self.hits.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.headers().clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let status = self.statuses[n.min(self.statuses.len() - 1)];
        Response::builder()
            .status(StatusCode::from_u16(status).unwrap())
            .body(Full::new(Bytes::from(format!("status {status}"))))
            .unwrap()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub script: Arc<Script>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}{path}", self.addr)
    }
}

/// Starts a plain HTTP server answering with `statuses`.
pub async fn serve(statuses: &[u16]) -> TestServer {
    start(statuses, None, None).await
}

/// Starts a server whose every answer takes `delay`.
pub async fn serve_slow(delay: Duration) -> TestServer {
    start(&[200], Some(delay), None).await
}

/// Starts an HTTPS server answering `200`.
pub async fn serve_tls(acceptor: TlsAcceptor) -> TestServer {
    start(&[200], None, Some(acceptor)).await
}

async fn start(statuses: &[u16], delay: Option<Duration>, tls: Option<TlsAcceptor>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let script = Arc::new(Script {
        statuses: statuses.to_vec(),
        delay,
        hits: AtomicUsize::new(0),
        seen: Mutex::new(Vec::new()),
    });

    let shared = script.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let script = shared.clone();
            let tls = tls.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let script = script.clone();
                    async move { Ok::<_, Infallible>(script.respond(request).await) }
                });
                match tls {
                    Some(acceptor) => {
                        if let Ok(stream) = acceptor.accept(stream).await {
                            let _ = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), service)
                                .await;
                        }
                    }
                    None => {
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await;
                    }
                }
            });
        }
    });

    TestServer { addr, script }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
