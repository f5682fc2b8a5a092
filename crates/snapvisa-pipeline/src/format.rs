//! Upload Format Validation
//!
//! Only JPEG and PNG uploads are accepted, and the file name has to agree
//! with what the bytes actually contain.

use std::path::Path;

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Accepted upload encodings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Jpeg,
    Png,
}

impl UploadFormat {
    /// Map a declared extension (`jpg`, `.JPEG`, `png`, ...) to a format.
    pub fn from_extension(extension: &str) -> Result<Self> {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            _ => Err(PipelineError::UnsupportedExtension(extension.to_string())),
        }
    }

    /// Detect the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self> {
        let detected = image::guess_format(bytes)
            .map_err(|_| PipelineError::Decode("unrecognized image data".into()))?;

        match detected {
            ImageFormat::Jpeg => Ok(Self::Jpeg),
            ImageFormat::Png => Ok(Self::Png),
            other => Err(PipelineError::FormatMismatch {
                declared: "JPEG or PNG",
                detected: format!("{other:?}").to_uppercase(),
            }),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
        }
    }

    pub const fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// Extension part of an uploaded file name, if any.
pub fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|ext| ext.to_str())
}

/// Check the declared extension against the content and return the format.
pub fn check_declared(bytes: &[u8], extension: &str) -> Result<UploadFormat> {
    let declared = UploadFormat::from_extension(extension)?;
    let detected = UploadFormat::sniff(bytes)?;

    if declared != detected {
        return Err(PipelineError::FormatMismatch {
            declared: declared.name(),
            detected: detected.name().to_string(),
        });
    }

    Ok(declared)
}
