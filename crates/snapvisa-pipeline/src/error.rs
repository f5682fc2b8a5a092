//! Error Types for the Photo Pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Unsupported file type '{0}'. Please upload a JPG, JPEG or PNG photo.")]
    UnsupportedExtension(String),

    #[error("File content is {detected} but the file name says {declared}")]
    FormatMismatch {
        declared: &'static str,
        detected: String,
    },

    #[error("Could not read image: {0}")]
    Decode(String),

    #[error("Image is {width}x{height} pixels; the maximum is {max}x{max}")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Invalid photo spec: {0}")]
    InvalidSpec(String),
}

impl PipelineError {
    /// Errors caused by the uploaded file rather than by the service.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedExtension(_)
                | Self::FormatMismatch { .. }
                | Self::Decode(_)
                | Self::DimensionsTooLarge { .. }
        )
    }
}
