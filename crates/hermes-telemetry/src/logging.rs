//! Structured logging setup.
//!
//! Installs the process-wide `tracing` subscriber that every
//! [`ContextualLogger`](hermes_core::ContextualLogger) writes through, and
//! fixes the global fields carried by root loggers.
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_telemetry::logging::{LogConfig, init_logging};
//!
//! let config = LogConfig::default().with_global_field("region", "eu-west-1");
//! init_logging(&config)?;
//!
//! hermes_core::ContextualLogger::root().info("service started");
//! ```

use crate::error::TelemetryError;
use crate::syslog::SyslogConfig;
use crate::TelemetryResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Field name under which the service name is added to global fields.
pub const SERVICE_FIELD: &str = "service";

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "path")]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// Append to a file.
    File(PathBuf),
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Log level or filter directive (e.g., "info", "hermes_client=debug").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Output destination.
    pub output: LogOutput,

    /// Further destinations receiving the same records, e.g. a file next to
    /// stdout.
    pub extra_outputs: Vec<LogOutput>,

    /// Also send every record to a syslog daemon.
    pub syslog: Option<SyslogConfig>,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Service name, added to the global fields.
    pub service_name: String,

    /// Fields carried by every root logger.
    pub global_fields: IndexMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            output: LogOutput::Stdout,
            extra_outputs: Vec::new(),
            syslog: None,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "hermes".to_string(),
            global_fields: IndexMap::new(),
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// Adds a global field.
    #[must_use]
    pub fn with_global_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    /// Returns the global fields, with the service name first.
    pub fn resolved_global_fields(&self) -> IndexMap<String, String> {
        let mut fields = IndexMap::with_capacity(self.global_fields.len() + 1);
        if !self.service_name.is_empty() {
            fields.insert(SERVICE_FIELD.to_string(), self.service_name.clone());
        }
        for (k, v) in &self.global_fields {
            fields.insert(k.clone(), v.clone());
        }
        fields
    }

    /// Adds a destination written alongside the primary output.
    #[must_use]
    pub fn with_extra_output(mut self, output: LogOutput) -> Self {
        self.extra_outputs.push(output);
        self
    }

    /// Sends every record to syslog as well.
    #[must_use]
    pub fn with_syslog(mut self, syslog: SyslogConfig) -> Self {
        self.syslog = Some(syslog);
        self
    }

    /// Opens every configured destination and tees them into one writer.
    pub(crate) fn make_writer(&self) -> TelemetryResult<BoxMakeWriter> {
        let mut writer = open_output(&self.output)?;
        for output in &self.extra_outputs {
            writer = BoxMakeWriter::new(writer.and(open_output(output)?));
        }
        if let Some(syslog) = &self.syslog {
            writer = BoxMakeWriter::new(writer.and(syslog.connect()?));
        }
        Ok(writer)
    }
}

fn open_output(output: &LogOutput) -> TelemetryResult<BoxMakeWriter> {
    Ok(match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    })
}

/// Initializes the logging subsystem.
///
/// Fixes the root logger's global fields, then installs the global
/// subscriber. Must be called once, before request traffic.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a
/// subscriber is already installed, and `TelemetryError::Io` if the log file
/// cannot be opened.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let writer = config.make_writer()?;

    // Root loggers created by the first records must already carry them.
    hermes_core::logger::set_global_fields(config.resolved_global_fields())
        .map_err(|_| TelemetryError::AlreadyInitialized("global log fields"))?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Creates an env filter from a string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}
