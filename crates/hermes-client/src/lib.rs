//! # Hermes Client
//!
//! Outbound HTTP for code running inside a Hermes request.
//!
//! [`ResilientHttpClient`] takes the caller's [`RequestContext`] on every
//! call and:
//!
//! - sends the request ID (generating one when the context has none)
//! - injects the active trace context when a tracer is registered
//! - retries transport failures and selected statuses with capped
//!   exponential backoff
//! - stops as soon as the context is cancelled or its deadline passes
//!
//! Error-classified answers come back as [`ClientError::Status`], which still
//! carries the full [`HttpClientResponse`].
//!
//! ## Example
//!
//! ```no_run
//! use hermes_client::{HttpClientOptions, ResilientHttpClient, RetryPolicy, TlsPolicy};
//! use hermes_core::RequestContext;
//!
//! # async fn example() -> Result<(), hermes_client::ClientError> {
//! let client = ResilientHttpClient::new(TlsPolicy::default())?;
//! let ctx = RequestContext::new().with_request_id("abc123");
//!
//! let options = HttpClientOptions::get("https://accounts.internal/v1/accounts")
//!     .accept_json()
//!     .retry(RetryPolicy::default().with_retryable_status_codes([502, 503]));
//! let response = client.execute(&ctx, options).await?;
//! assert!(response.is_2xx());
//! # Ok(())
//! # }
//! ```
//!
//! [`RequestContext`]: hermes_core::RequestContext

#![doc(html_root_url = "https://docs.rs/hermes-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod metrics;
mod options;
mod response;
mod retry;
mod tls;

pub use client::{ResilientHttpClient, ResilientHttpClientBuilder, REQUEST_ID_HEADER};
pub use error::{ClientError, ClientResult};
pub use options::{HttpClientOptions, TENANT_HEADER};
pub use response::{HttpClientResponse, StatusClass};
pub use retry::RetryPolicy;
pub use tls::TlsPolicy;
