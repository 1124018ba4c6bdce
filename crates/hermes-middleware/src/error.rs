//! Middleware configuration errors.

use thiserror::Error;

/// Errors raised while building interceptors.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// A configured header name is not a valid HTTP header name.
    #[error("invalid header name '{name}': {source}")]
    InvalidHeaderName {
        /// The rejected name.
        name: String,
        /// Parse failure.
        #[source]
        source: http::header::InvalidHeaderName,
    },
}

/// Parses a configured header name.
pub(crate) fn parse_header_name(name: &str) -> Result<http::HeaderName, MiddlewareError> {
    http::HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
        MiddlewareError::InvalidHeaderName {
            name: name.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_name_lowercases() {
        let name = parse_header_name("X-Request-ID").unwrap();
        assert_eq!(name.as_str(), "x-request-id");
    }

    #[test]
    fn test_parse_header_name_rejects_spaces() {
        let err = parse_header_name("bad header").unwrap_err();
        assert!(err.to_string().starts_with("invalid header name 'bad header'"));
    }
}
