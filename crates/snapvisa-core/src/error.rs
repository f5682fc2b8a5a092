//! Error Types

use snapvisa_pipeline::PipelineError;
use thiserror::Error;

/// Result type alias for snapvisa operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error taxonomy shared by every snapvisa component
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed or out-of-policy input; always user-correctable
    #[error("{0}")]
    Validation(String),

    /// Operation attempted out of order (e.g. checkout before upload)
    #[error("Invalid state: {0}")]
    State(String),

    /// Entitlement, quota or anti-forgery check failed
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Referenced resource is absent from the session
    #[error("Not found: {0}")]
    NotFound(String),

    /// The payment provider failed or returned an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Durable storage (feedback log, session store) failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected failure inside the service
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::State(_) => "STATE_ERROR",
            Self::Permission(_) => "PERMISSION_DENIED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if retrying the same request might succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Storage(_))
    }

    /// Message safe to show the client. Provider, storage and internal
    /// details are replaced with generic text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::State(msg) | Self::Permission(msg) | Self::NotFound(msg) => {
                msg.clone()
            }
            Self::Provider(_) => "Payment processing failed. Please try again.".into(),
            Self::Storage(_) => "Could not save your submission. Please try again later.".into(),
            Self::Internal(_) => "An unexpected error occurred.".into(),
        }
    }
}

impl From<PipelineError> for CoreError {
    fn from(err: PipelineError) -> Self {
        if err.is_validation() {
            Self::Validation(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_detail_is_hidden() {
        let err = CoreError::Provider("stripe: invalid api key sk_live_123".into());
        assert!(!err.user_message().contains("sk_live"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_pipeline_errors_map_to_validation() {
        let err: CoreError = PipelineError::UnsupportedExtension("gif".into()).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.user_message().contains("JPG"));

        let err: CoreError = PipelineError::Encode("oom".into()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
