//! TLS policy and its application to the transport.
//!
//! Trust material is loaded when the transport is built, never per attempt.
//! A trusted CA file replaces the built-in roots: if it holds no usable
//! certificate the store stays empty and every handshake fails later.

use crate::error::{ClientError, ClientResult};
use reqwest::{Certificate, ClientBuilder, Identity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// TLS settings for outbound calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPolicy {
    /// Accept any server certificate. Logged on every call.
    pub insecure_skip_verify: bool,
    /// PEM bundle used instead of the built-in roots.
    pub trusted_ca_certificate_path: Option<PathBuf>,
    /// PEM client certificate for mutual TLS.
    pub client_certificate_path: Option<PathBuf>,
    /// PEM private key matching the client certificate.
    pub client_key_path: Option<PathBuf>,
}

impl TlsPolicy {
    /// A policy that skips server verification.
    pub fn insecure() -> Self {
        Self {
            insecure_skip_verify: true,
            ..Self::default()
        }
    }

    /// Trusts only the certificates in the given PEM file.
    #[must_use]
    pub fn with_trusted_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.trusted_ca_certificate_path = Some(path.into());
        self
    }

    /// Presents a client certificate.
    #[must_use]
    pub fn with_client_identity(
        mut self,
        certificate: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.client_certificate_path = Some(certificate.into());
        self.client_key_path = Some(key.into());
        self
    }

    /// Applies this policy to a client builder.
    pub(crate) fn apply(&self, mut builder: ClientBuilder) -> ClientResult<ClientBuilder> {
        if self.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &self.trusted_ca_certificate_path {
            builder = builder.tls_built_in_root_certs(false);
            for certificate in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(certificate);
            }
        }

        match (&self.client_certificate_path, &self.client_key_path) {
            (Some(certificate), Some(key)) => {
                builder = builder.identity(load_identity(certificate, key)?);
            }
            (None, None) => {}
            _ => {
                return Err(ClientError::config(
                    "client certificate and key must be given together",
                ));
            }
        }

        Ok(builder)
    }
}

fn read_file(kind: &str, path: &Path) -> ClientResult<Vec<u8>> {
    fs::read(path)
        .map_err(|e| ClientError::tls(format!("failed to read {kind} {}: {e}", path.display())))
}

fn load_ca_bundle(path: &Path) -> ClientResult<Vec<Certificate>> {
    let pem = read_file("trusted CA file", path)?;
    match Certificate::from_pem_bundle(&pem) {
        Ok(certificates) if !certificates.is_empty() => Ok(certificates),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "trusted CA file holds no certificates");
            Ok(Vec::new())
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse trusted CA file");
            Ok(Vec::new())
        }
    }
}

fn load_identity(certificate: &Path, key: &Path) -> ClientResult<Identity> {
    let mut pem = read_file("client certificate", certificate)?;
    pem.push(b'\n');
    pem.extend(read_file("client key", key)?);
    Identity::from_pem(&pem)
        .map_err(|e| ClientError::tls(format!("invalid client identity: {e}")))
}
