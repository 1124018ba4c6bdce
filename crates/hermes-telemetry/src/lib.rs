//! Process-wide logging and tracing setup for Hermes services.
//!
//! Everything here is written once at start-up, before request traffic, and
//! only read afterwards:
//!
//! - **Logging**: the `tracing` subscriber (JSON or pretty; stdout, stderr,
//!   files and syslog, teed when several are set) and the global fields
//!   carried by every root
//!   [`ContextualLogger`](hermes_core::ContextualLogger)
//! - **Tracing**: an OpenTelemetry provider with OTLP export, registered as
//!   the [`TracerHandle`] used by the tracing interceptor and the HTTP client
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::builder()
//!         .service_name("orders")
//!         .otlp_endpoint("http://localhost:4317")
//!         .build();
//!
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod syslog;
pub mod tracing;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogOutput};
pub use syslog::{SyslogConfig, SyslogProtocol};
pub use tracing::{
    init_tracing, is_tracer_configured, register_tracer, registered_tracer, HeaderExtractor,
    HeaderInjector, TracerHandle, TracingConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Guard that shuts down the tracer provider on drop.
///
/// Keep it alive for the lifetime of the application. Dropping it flushes
/// pending spans.
pub struct TelemetryGuard {
    tracer_provider: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl TelemetryGuard {
    /// Creates a new telemetry guard.
    #[must_use]
    pub fn new(tracer_provider: Option<opentelemetry_sdk::trace::TracerProvider>) -> Self {
        Self { tracer_provider }
    }

    /// Returns `true` if the guard owns a tracer provider.
    pub fn has_tracer(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            for result in provider.force_flush() {
                if let Err(e) = result {
                    ::tracing::warn!(error = %e, "failed to flush tracer provider");
                }
            }
            if let Err(e) = provider.shutdown() {
                ::tracing::warn!(error = %e, "failed to shut down tracer provider");
            }
        }
    }
}

/// Initializes logging, then tracing.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    let config = config.clone().resolved();

    init_logging(&config.logging)?;
    let tracer_provider = init_tracing(&config.tracing)?;

    if tracer_provider.is_some() {
        ::tracing::info!(
            service = %config.service_name,
            endpoint = %config.tracing.otlp_endpoint,
            "tracing enabled"
        );
    }

    Ok(TelemetryGuard::new(tracer_provider))
}
