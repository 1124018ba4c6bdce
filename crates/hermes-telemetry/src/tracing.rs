//! OpenTelemetry distributed tracing.
//!
//! A [`TracerHandle`] bundles the tracer used to start request spans with the
//! wire propagator used to move span context across process boundaries. One
//! handle is registered process-wide at start-up; the tracing interceptor and
//! the HTTP client consult it, and treat its absence as "tracing disabled".
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_telemetry::tracing::{TracingConfig, init_tracing};
//!
//! let config = TracingConfig {
//!     enabled: true,
//!     ..TracingConfig::default()
//! };
//! let provider = init_tracing(&config)?;
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Instrumentation scope name for spans started by Hermes.
pub const TRACER_NAME: &str = "hermes";

static TRACER: OnceLock<TracerHandle> = OnceLock::new();

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Whether tracing is enabled.
    pub enabled: bool,

    /// OTLP endpoint (e.g., `http://localhost:4317`).
    pub otlp_endpoint: String,

    /// Service name for spans.
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// Deployment environment.
    pub environment: String,

    /// Sampling ratio (0.0 to 1.0).
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "hermes".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            sample_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    /// Creates a production configuration with lower sampling.
    #[must_use]
    pub fn production(service_name: &str, version: &str) -> Self {
        Self {
            enabled: true,
            service_name: service_name.to_string(),
            service_version: version.to_string(),
            environment: "production".to_string(),
            sample_ratio: 0.1,
            ..Self::default()
        }
    }

    fn sampler(&self) -> Sampler {
        if self.sample_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sample_ratio <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sample_ratio)
        }
    }
}

/// A tracer paired with its wire propagation format.
#[derive(Clone)]
pub struct TracerHandle {
    tracer: Tracer,
    propagator: Arc<dyn TextMapPropagator + Send + Sync>,
}

impl TracerHandle {
    /// Creates a handle from a tracer and a propagator.
    pub fn new(tracer: Tracer, propagator: impl TextMapPropagator + Send + Sync + 'static) -> Self {
        Self {
            tracer,
            propagator: Arc::new(propagator),
        }
    }

    /// Creates a handle using W3C Trace Context propagation.
    pub fn from_provider(provider: &TracerProvider) -> Self {
        Self::new(provider.tracer(TRACER_NAME), TraceContextPropagator::new())
    }

    /// Returns the tracer.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Extracts an upstream span context from inbound headers.
    ///
    /// Headers with no trace context yield an empty context, from which a
    /// root span is started.
    pub fn extract(&self, headers: &http::HeaderMap) -> opentelemetry::Context {
        self.propagator.extract(&HeaderExtractor(headers))
    }

    /// Injects the span context in `cx` into outbound headers.
    pub fn inject(&self, cx: &opentelemetry::Context, headers: &mut http::HeaderMap) {
        self.propagator
            .inject_context(cx, &mut HeaderInjector(headers));
    }
}

impl fmt::Debug for TracerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerHandle")
            .field("propagator", &self.propagator)
            .finish_non_exhaustive()
    }
}

/// Registers the process-wide tracer.
///
/// # Errors
///
/// Returns `TelemetryError::AlreadyInitialized` if a tracer is registered.
pub fn register_tracer(handle: TracerHandle) -> TelemetryResult<()> {
    TRACER
        .set(handle)
        .map_err(|_| TelemetryError::AlreadyInitialized("tracer"))
}

/// Returns the process-wide tracer, if one is registered.
pub fn registered_tracer() -> Option<&'static TracerHandle> {
    TRACER.get()
}

/// Returns `true` if a process-wide tracer is registered.
pub fn is_tracer_configured() -> bool {
    TRACER.get().is_some()
}

/// Initializes the tracing subsystem.
///
/// Builds an OTLP-exporting provider, registers it as the process-wide
/// tracer and installs it as the OpenTelemetry global. Must run inside a
/// tokio runtime. Returns the provider for later shutdown.
///
/// # Errors
///
/// Returns `TelemetryError::TracingInit` if the exporter cannot be built and
/// `TelemetryError::AlreadyInitialized` if a tracer is registered.
pub fn init_tracing(config: &TracingConfig) -> TelemetryResult<Option<TracerProvider>> {
    if !config.enabled {
        return Ok(None);
    }

    let resource = Resource::new([
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
            config.service_name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_VERSION,
            config.service_version.clone(),
        ),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    register_tracer(TracerHandle::from_provider(&provider))?;
    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(Some(provider))
}

/// HTTP header extractor for `http::HeaderMap`.
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(http::HeaderName::as_str).collect()
    }
}

/// HTTP header injector for `http::HeaderMap`.
pub struct HeaderInjector<'a>(pub &'a mut http::HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(val)) = (
            http::header::HeaderName::try_from(key),
            http::header::HeaderValue::try_from(&value),
        ) {
            self.0.insert(name, val);
        }
    }
}
