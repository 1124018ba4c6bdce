//! Outbound call metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

use crate::response::StatusClass;
use metrics::{counter, describe_counter};
use std::sync::Once;

static DESCRIBE: Once = Once::new();

/// Registers metric descriptions once per process.
pub(crate) fn describe() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "hermes_http_client_attempts_total",
            "Outbound HTTP attempts, retries included"
        );
        describe_counter!(
            "hermes_http_client_requests_total",
            "Outbound HTTP calls by final outcome"
        );
    });
}

pub(crate) fn record_attempt(method: &str) {
    counter!("hermes_http_client_attempts_total", "method" => method.to_string()).increment(1);
}

/// Records the final outcome of a call.
///
/// `class` is a status class label, `transport_error` or `cancelled`.
pub(crate) fn record_outcome(method: &str, class: &'static str) {
    counter!(
        "hermes_http_client_requests_total",
        "method" => method.to_string(),
        "class" => class
    )
    .increment(1);
}

pub(crate) fn record_response(method: &str, class: StatusClass) {
    record_outcome(method, class.as_str());
}
