//! Header configuration for the standard chain.

use crate::interceptors::{REQUEST_ID_HEADER, TENANT_HEADER};
use serde::{Deserialize, Serialize};

/// Header names read and written by the standard interceptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Header carrying the request ID, in both directions.
    pub request_id_header: String,

    /// Header carrying the tenant tag.
    pub tenant_header: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            request_id_header: REQUEST_ID_HEADER.to_string(),
            tenant_header: TENANT_HEADER.to_string(),
        }
    }
}
