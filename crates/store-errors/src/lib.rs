//! Shared error types and response codes used across the multi-store crates.
//!
//! This crate provides the ABCI-style numeric response codes that a query
//! response carries, independent of the richer `StoreError` taxonomy that
//! `multistore` defines for its own internal error handling.

use thiserror::Error;

/// A generic application-level error, kept small and string-based on
/// purpose: callers that need structured variants define their own error
/// type and only reach for these codes when producing a wire response.
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be parsed or was otherwise malformed.
    #[error("invalid request:: {0}")]
    InvalidRequest(String),

    /// The requested resource does not exist.
    #[error("not found:: {0}")]
    NotFound(String),

    /// An error with no closer-fitting variant.
    #[error("unknown error:: {0}")]
    Unknown(String),

    /// A pre-coded error, used when constructing a query response directly
    /// from a numeric code.
    #[error("error {code}: {message}")]
    Custom { code: u32, message: String },
}

/// Result type alias used by crates that only need the generic error above.
pub type Result<T> = std::result::Result<T, Error>;

/// ABCI-style numeric response codes. `0` always means success; every
/// other value is a caller-visible failure code attached to a query
/// response's `code` field.
pub mod codes {
    /// Success.
    pub const OK: u32 = 0;
    /// Internal error; always fatal when it occurs on the commit path.
    pub const INTERNAL: u32 = 1;
    /// Malformed query path or request.
    pub const UNKNOWN_REQUEST: u32 = 2;
    /// Generic invalid argument.
    pub const INVALID_ARGUMENT: u32 = 3;
    /// No mounted store matches the requested name.
    pub const UNKNOWN_STORE: u32 = 4;
    /// Resource not found.
    pub const NOT_FOUND: u32 = 5;
    /// Requested height has been pruned or is not yet available.
    pub const PRUNED_HEIGHT: u32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidRequest("missing field".to_string());
        assert_eq!(err.to_string(), "invalid request:: missing field");
    }

    #[test]
    fn test_custom_code_roundtrip() {
        let err = Error::Custom {
            code: codes::PRUNED_HEIGHT,
            message: "height 3 pruned".to_string(),
        };
        assert_eq!(err.to_string(), "error 6: height 3 pruned");
    }
}
