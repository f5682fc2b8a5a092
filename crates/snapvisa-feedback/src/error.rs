//! Feedback Error Types

use snapvisa_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedbackError>;

#[derive(Error, Debug)]
pub enum FeedbackError {
    /// Submission rejected; message is shown to the user
    #[error("{0}")]
    Validation(String),

    /// Append to the durable log failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Sink cannot perform the operation (e.g. listing a remote form)
    #[error("{0} sink does not support this operation")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<FeedbackError> for CoreError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::Validation(msg) => Self::Validation(msg),
            FeedbackError::Storage(msg) => Self::Storage(msg),
            FeedbackError::Unsupported(sink) => {
                Self::NotFound(format!("Feedback listing is not available for the {sink} sink."))
            }
            FeedbackError::Config(msg) => Self::Internal(msg),
        }
    }
}
