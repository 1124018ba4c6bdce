//! Contextual logging.
//!
//! A [`ContextualLogger`] is an immutable set of key/value fields. Deriving a
//! logger with [`ContextualLogger::with_field`] produces a new value and leaves
//! the receiver untouched, so loggers can be shared across tasks without
//! locking. Every logger writes through the process-wide `tracing`
//! subscriber, which is configured once at start-up.
//!
//! # Example
//!
//! ```
//! use hermes_core::ContextualLogger;
//!
//! let base = ContextualLogger::empty().with_field("component", "billing");
//! let scoped = base.with_request_id("abc123");
//!
//! assert_eq!(base.field("request_id"), None);
//! assert_eq!(scoped.field("request_id"), Some("abc123"));
//! scoped.info("charging card");
//! ```

use crate::error::CoreError;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::Level;

/// Standard field names for request-scoped log records.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// Tenant field name.
    pub const TENANT: &str = "tenant";

    /// Trace ID field name.
    pub const TRACE_ID: &str = "trace_id";

    /// Span ID field name.
    pub const SPAN_ID: &str = "span_id";

    pub(crate) const STANDARD: [&str; 4] = [REQUEST_ID, TENANT, TRACE_ID, SPAN_ID];
}

static ROOT: OnceLock<ContextualLogger> = OnceLock::new();

/// Fixes the fields carried by every root logger.
///
/// Must run once, before request traffic and before the first call to
/// [`ContextualLogger::root`]. Later calls fail with
/// [`CoreError::GlobalFieldsAlreadySet`].
pub fn set_global_fields<I, K, V>(global: I) -> Result<(), CoreError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let logger = global
        .into_iter()
        .fold(ContextualLogger::empty(), |logger, (k, v)| {
            logger.with_field(k, v)
        });
    ROOT.set(logger)
        .map_err(|_| CoreError::GlobalFieldsAlreadySet)
}

/// An immutable logger carrying an ordered set of fields.
///
/// Two loggers compare equal when their field sets are identical, including
/// insertion order.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ContextualLogger {
    fields: Arc<IndexMap<String, String>>,
}

impl ContextualLogger {
    /// Creates a logger with no fields, ignoring any global fields.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the process default logger, carrying the global fields.
    pub fn root() -> &'static Self {
        ROOT.get_or_init(Self::empty)
    }

    /// Returns a new logger with `key` set to `value`.
    ///
    /// Writing a key that already exists replaces its value in the derived
    /// logger and keeps its original position.
    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut fields = (*self.fields).clone();
        fields.insert(key.into(), value.into());
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Returns a new logger tagged with the request ID.
    #[must_use]
    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        self.with_field(fields::REQUEST_ID, request_id)
    }

    /// Returns a new logger tagged with the tenant.
    #[must_use]
    pub fn with_tenant(&self, tenant: impl Into<String>) -> Self {
        self.with_field(fields::TENANT, tenant)
    }

    /// Returns a new logger tagged with trace and span IDs.
    #[must_use]
    pub fn with_tracing(&self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.with_field(fields::TRACE_ID, trace_id)
            .with_field(fields::SPAN_ID, span_id)
    }

    /// Returns the field set in insertion order.
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    /// Returns the value of a single field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Emits a record at `level`.
    ///
    /// Standard fields become structured fields on the event. Any other
    /// fields are rendered together as a JSON object under `extra`.
    pub fn log(&self, level: Level, message: &str) {
        let request_id = self.field(fields::REQUEST_ID);
        let tenant = self.field(fields::TENANT);
        let trace_id = self.field(fields::TRACE_ID);
        let span_id = self.field(fields::SPAN_ID);
        let extra = self.render_extra();

        macro_rules! emit {
            ($lvl:expr) => {
                tracing::event!(
                    $lvl,
                    request_id,
                    tenant,
                    trace_id,
                    span_id,
                    extra = extra.as_deref(),
                    "{}",
                    message
                )
            };
        }

        match level {
            Level::ERROR => emit!(Level::ERROR),
            Level::WARN => emit!(Level::WARN),
            Level::INFO => emit!(Level::INFO),
            Level::DEBUG => emit!(Level::DEBUG),
            _ => emit!(Level::TRACE),
        }
    }

    /// Emits an error record.
    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    /// Emits a warning record.
    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    /// Emits an info record.
    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    /// Emits a debug record.
    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    /// Emits a trace record.
    pub fn trace(&self, message: &str) {
        self.log(Level::TRACE, message);
    }

    fn render_extra(&self) -> Option<String> {
        let extra: IndexMap<&str, &str> = self
            .fields
            .iter()
            .filter(|(k, _)| !fields::STANDARD.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if extra.is_empty() {
            return None;
        }
        serde_json::to_string(&extra).ok()
    }
}

impl fmt::Debug for ContextualLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}
