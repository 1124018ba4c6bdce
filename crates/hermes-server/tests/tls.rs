//! HTTPS serving with a throwaway CA.

use hermes_client::{HttpClientOptions, ResilientHttpClient, RetryPolicy, TlsPolicy};
use hermes_core::RequestContext;
use hermes_middleware::{handler_fn, Response, ResponseExt};
use hermes_server::{HttpServer, ServerConfig, ShutdownSignal};
use http::StatusCode;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use std::io::Write;
use tempfile::NamedTempFile;

struct Pki {
    ca: NamedTempFile,
    cert: NamedTempFile,
    key: NamedTempFile,
}

fn write_pem(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// A CA plus a leaf certificate for 127.0.0.1 signed by it.
fn pki() -> Pki {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "hermes server test CA");
    let ca_key = KeyPair::generate().unwrap();
    let ca = ca_params.self_signed(&ca_key).unwrap();

    let mut leaf_params =
        CertificateParams::new(vec!["127.0.0.1".to_string(), "localhost".to_string()]).unwrap();
    leaf_params
        .distinguished_name
        .push(DnType::CommonName, "localhost");
    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

    Pki {
        ca: write_pem(&ca.pem()),
        cert: write_pem(&leaf.pem()),
        key: write_pem(&leaf_key.serialize_pem()),
    }
}

#[tokio::test]
async fn serves_https_with_configured_certificate() {
    let pki = pki();
    let config = ServerConfig::default()
        .with_bind_addr("127.0.0.1:0")
        .with_tls(pki.cert.path(), pki.key.path());
    let server = HttpServer::standard(
        config,
        handler_fn(|ctx: RequestContext, _req| async move {
            Response::text(StatusCode::OK, ctx.request_id().to_string())
        }),
    )
    .unwrap();
    let bound = server.bind().await.unwrap();
    assert!(bound.is_tls());
    let addr = bound.local_addr();
    let shutdown = ShutdownSignal::new();
    let task = tokio::spawn(bound.run(shutdown.clone()));

    let client =
        ResilientHttpClient::new(TlsPolicy::default().with_trusted_ca(pki.ca.path())).unwrap();
    let ctx = RequestContext::new().with_request_id("tls-1");
    let response = client
        .execute(
            &ctx,
            HttpClientOptions::get(format!("https://127.0.0.1:{}/", addr.port()))
                .retry(RetryPolicy::no_retry()),
        )
        .await
        .unwrap();

    assert!(response.is_2xx());
    assert_eq!(response.body_as_string(), "tls-1");
    assert_eq!(response.header("x-request-id"), Some("tls-1"));

    let plain = ResilientHttpClient::new(TlsPolicy::default())
        .unwrap()
        .execute(
            &RequestContext::new(),
            HttpClientOptions::get(format!("http://127.0.0.1:{}/", addr.port()))
                .retry(RetryPolicy::no_retry()),
        )
        .await;
    assert!(plain.is_err(), "plain HTTP must not be served on a TLS listener");

    shutdown.trigger();
    task.await.unwrap().unwrap();
}
