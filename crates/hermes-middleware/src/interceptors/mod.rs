//! Standard interceptors.
//!
//! | Order | Interceptor                | Adds to the context            |
//! |-------|----------------------------|--------------------------------|
//! | 1     | [`RequestIdInterceptor`]   | `request_id`                   |
//! | 2     | [`TenantInterceptor`]      | `tenant` (when the header is set) |
//! | 3     | [`TracingInterceptor`]     | `trace_id`, `span_id`, active span |
//!
//! Each one also attaches a logger enriched with what it added.

pub mod request_id;
pub mod tenant;
pub mod tracing;

pub use request_id::{RequestIdInterceptor, REQUEST_ID_HEADER};
pub use tenant::{TenantInterceptor, TENANT_HEADER};
pub use tracing::TracingInterceptor;
