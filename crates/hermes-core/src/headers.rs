//! Header names shared by the inbound interceptors and the outbound client.

/// Default header carrying the request ID, inbound and outbound.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default header carrying the tenant tag.
pub const TENANT_HEADER: &str = "x-tenant";
