//! Server-side TLS.
//!
//! Certificates and keys are PEM files. The chain is sent in file order,
//! leaf first; the key may be PKCS#8, PKCS#1 or SEC1.

use crate::error::ConfigError;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Certificate and key served by the listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTlsConfig {
    /// PEM certificate chain, leaf first.
    pub certificate_path: PathBuf,

    /// PEM private key for the leaf certificate.
    pub key_path: PathBuf,
}

impl ServerTlsConfig {
    /// Creates a TLS config from a certificate chain and key.
    pub fn new(certificate_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            certificate_path: certificate_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Loads the files and builds the handshake acceptor.
    pub fn acceptor(&self) -> Result<TlsAcceptor, ConfigError> {
        let certs = load_certificates(&self.certificate_path)?;
        let key = PrivateKeyDer::from_pem_file(&self.key_path)
            .map_err(|e| tls_error(&self.key_path, e))?;

        let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ConfigError::Tls(format!("unusable certificate or key: {e}")))?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| tls_error(path, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(path, e))?;

    if certs.is_empty() {
        return Err(ConfigError::Tls(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn tls_error(path: &Path, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Tls(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_pem(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        (write_pem(&cert.pem()), write_pem(&key.serialize_pem()))
    }

    #[test]
    fn test_acceptor_from_pem_files() {
        let (cert, key) = self_signed();
        let config = ServerTlsConfig::new(cert.path(), key.path());
        assert!(config.acceptor().is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let (_, key) = self_signed();
        let config = ServerTlsConfig::new("/nonexistent/cert.pem", key.path());
        let err = config.acceptor().err().unwrap();
        assert!(matches!(err, ConfigError::Tls(ref m) if m.contains("/nonexistent/cert.pem")));
    }

    #[test]
    fn test_file_without_certificates_is_rejected() {
        let (_, key) = self_signed();
        let empty = write_pem("nothing here\n");
        let err = ServerTlsConfig::new(empty.path(), key.path())
            .acceptor()
            .err().unwrap();
        assert!(matches!(err, ConfigError::Tls(ref m) if m.contains("no certificates")));
    }
}
