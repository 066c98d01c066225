//! Error types for Quire operations

use crate::enums::ReadingStatusParseError;
use thiserror::Error;

/// Malformed local input, rejected before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Operation {operation} requires an authenticated identity")]
    IdentityRequired { operation: String },

    #[error("A saved caller profile is required before {operation}")]
    ProfileRequired { operation: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ReadingStatusParseError> for ValidationError {
    fn from(err: ReadingStatusParseError) -> Self {
        Self::invalid("status", err.to_string())
    }
}

/// Failure reported by the remote store or the transport to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote call {operation} failed: {reason}")]
    CallFailed { operation: String, reason: String },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: u64 },

    #[error("Remote call {operation} rejected: caller is not authorized")]
    Unauthorized { operation: String },
}

impl RemoteError {
    pub fn call_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Binary resource fetch failure. Absorbed by the resolver, never surfaced
/// to presentation beyond a missing image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Failed to fetch bytes for {reference}: {reason}")]
    FetchFailed { reference: String, reason: String },

    #[error("Resource {reference} returned no bytes")]
    Empty { reference: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all Quire errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuireError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl QuireError {
    /// Returns `true` if the user retrying the same action might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Remote(RemoteError::CallFailed { .. }) | Self::Resolve(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ReadingStatusParseError> for QuireError {
    fn from(err: ReadingStatusParseError) -> Self {
        Self::Validation(err.into())
    }
}

/// Result type alias for Quire operations.
pub type QuireResult<T> = Result<T, QuireError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::required("title");
        assert_eq!(err.to_string(), "Required field missing: title");

        let err = ValidationError::invalid("rating", "must be between 1 and 5");
        assert!(err.to_string().contains("rating"));
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::NotFound {
            entity: "Review".to_string(),
            id: 7,
        };
        assert_eq!(err.to_string(), "Review with id 7 not found");
    }

    #[test]
    fn test_master_error_from_conversions() {
        let err: QuireError = ValidationError::required("name").into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());

        let err: QuireError = RemoteError::call_failed("likeReview", "timeout").into();
        assert!(err.is_retryable());

        let err: QuireError = RemoteError::Unauthorized {
            operation: "getTrackedBooks".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_parse_error_becomes_validation() {
        let err: QuireError = ReadingStatusParseError("Paused".to_string()).into();
        match err {
            QuireError::Validation(ValidationError::InvalidValue { field, .. }) => {
                assert_eq!(field, "status");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
