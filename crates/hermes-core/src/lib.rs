//! # Hermes Core
//!
//! Request-scoped state shared by every stage of the Hermes request spine.
//!
//! - [`RequestContext`] - Immutable per-request carrier for identity, tenant, trace ids and logger
//! - [`RequestId`] - Request identifier, generated as 32 lowercase hex characters
//! - [`ContextualLogger`] - Logger value enriched by deriving, never by mutation
//! - [`Done`] - Why a request context stopped accepting work
//!
//! Contexts are passed explicitly through every call boundary. There is no
//! ambient or thread-local lookup.

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod headers;
pub mod logger;

pub use context::{Done, RequestContext, RequestId};
pub use error::CoreError;
pub use headers::{REQUEST_ID_HEADER, TENANT_HEADER};
pub use logger::{fields, ContextualLogger};
