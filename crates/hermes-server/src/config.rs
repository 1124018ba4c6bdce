//! Server configuration.
//!
//! Loaded from TOML or JSON, then overridden from `HERMES_*` environment
//! variables, then validated:
//!
//! ```rust,no_run
//! use hermes_server::ServerConfig;
//!
//! # fn example() -> Result<(), hermes_server::ConfigError> {
//! let config = ServerConfig::from_file("hermes.toml")?.with_env_overrides();
//! config.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! | Variable                       | Field                          |
//! |--------------------------------|--------------------------------|
//! | `HERMES_BIND_ADDR`             | `bind_addr`                    |
//! | `HERMES_SHUTDOWN_TIMEOUT_MS`   | `shutdown_timeout_ms`          |
//! | `HERMES_REQUEST_TIMEOUT_MS`    | `request_timeout_ms`           |
//! | `HERMES_SIGNALS`               | `signals` (comma separated)    |
//! | `HERMES_TLS_CERT_PATH`         | `tls.certificate_path`, with `HERMES_TLS_KEY_PATH` |
//! | `HERMES_TLS_KEY_PATH`          | `tls.key_path`, with `HERMES_TLS_CERT_PATH` |
//! | `HERMES_SERVICE_NAME`          | `telemetry.service_name`       |
//! | `HERMES_LOG_LEVEL`             | `telemetry.logging.level`      |
//! | `HERMES_OTLP_ENDPOINT`         | `telemetry.tracing.otlp_endpoint`, enables tracing |

use crate::error::{ConfigError, ShutdownError};
use crate::shutdown::Signal;
use crate::tls::ServerTlsConfig;
use hermes_middleware::ChainConfig;
use hermes_telemetry::TelemetryConfig;
use http::HeaderName;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default graceful shutdown timeout in milliseconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// How long to wait for open connections after shutdown starts, in
    /// milliseconds.
    pub shutdown_timeout_ms: u64,

    /// Per-request deadline in milliseconds, counted from when the request
    /// body has been read. Unset means no deadline.
    pub request_timeout_ms: Option<u64>,

    /// Serve HTTPS with this certificate. Unset means plain HTTP.
    pub tls: Option<ServerTlsConfig>,

    /// Signals that trigger shutdown.
    pub signals: Vec<String>,

    /// Header names for the standard chain.
    pub chain: ChainConfig,

    /// Logging and tracing.
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            request_timeout_ms: None,
            tls: None,
            signals: vec!["SIGINT".to_string(), "SIGTERM".to_string()],
            chain: ChainConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
            _ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
        }
    }

    /// Applies `HERMES_*` environment variable overrides.
    ///
    /// Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable source.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("HERMES_BIND_ADDR") {
            self.bind_addr = addr;
        }

        if let Some(ms) = lookup("HERMES_SHUTDOWN_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.shutdown_timeout_ms = ms;
        }

        if let Some(ms) = lookup("HERMES_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = Some(ms);
        }

        if let (Some(cert), Some(key)) = (lookup("HERMES_TLS_CERT_PATH"), lookup("HERMES_TLS_KEY_PATH")) {
            self.tls = Some(ServerTlsConfig::new(cert, key));
        }

        if let Some(signals) = lookup("HERMES_SIGNALS") {
            self.signals = signals
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(name) = lookup("HERMES_SERVICE_NAME") {
            self.telemetry.service_name = name;
        }

        if let Some(level) = lookup("HERMES_LOG_LEVEL") {
            self.telemetry.logging.level = level;
        }

        if let Some(endpoint) = lookup("HERMES_OTLP_ENDPOINT") {
            self.telemetry.tracing.otlp_endpoint = endpoint;
            self.telemetry.tracing.enabled = true;
        }

        self
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        let signals = self
            .signals()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if signals.is_empty() {
            return Err(ConfigError::Invalid(ShutdownError::NoSignals.to_string()));
        }

        for (field, value) in [
            ("chain.request_id_header", &self.chain.request_id_header),
            ("chain.tenant_header", &self.chain.tenant_header),
        ] {
            HeaderName::from_bytes(value.as_bytes())
                .map_err(|e| ConfigError::Invalid(format!("{field} {value:?}: {e}")))?;
        }

        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(tls) = &self.tls {
            if tls.certificate_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
                return Err(ConfigError::Tls(
                    "both certificate_path and key_path are required".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Parses the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind_addr {:?}: {e}", self.bind_addr)))
    }

    /// Parses the shutdown signal names.
    pub fn signals(&self) -> Result<Vec<Signal>, ShutdownError> {
        self.signals.iter().map(|s| s.parse()).collect()
    }

    /// Graceful shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Per-request deadline, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Sets the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = millis(timeout);
        self
    }

    /// Sets the per-request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(millis(timeout));
        self
    }

    /// Serves HTTPS with the given PEM certificate chain and key.
    #[must_use]
    pub fn with_tls(mut self, certificate_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(ServerTlsConfig::new(certificate_path, key_path));
        self
    }

    /// Sets the shutdown signals.
    #[must_use]
    pub fn with_signals(mut self, signals: &[Signal]) -> Self {
        self.signals = signals.iter().map(|s| s.as_str().to_string()).collect();
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
