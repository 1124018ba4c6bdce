//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while configuring process-wide logging state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Global log fields were already fixed, either by an earlier call or
    /// because the root logger was used before configuration.
    #[error("global log fields are already initialized")]
    GlobalFieldsAlreadySet,
}
