//! Photo Specifications
//!
//! Target geometry and file-size rules for a passport photo. The default
//! preset follows the BLS Canada requirements for OCI, passport and visa
//! applications.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Target resolution, byte budget and quality ladder for one photo standard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSpec {
    /// Output width in pixels
    pub target_width: u32,

    /// Output height in pixels
    pub target_height: u32,

    /// Largest accepted upload edge, in pixels
    pub max_dimension: u32,

    /// Largest accepted output size, in bytes
    pub max_bytes: usize,

    /// JPEG quality of the first encode
    pub initial_quality: u8,

    /// Fallback qualities, tried in order when the first encode is too big
    pub fallback_qualities: Vec<u8>,

    /// Edge length of the upload preview thumbnail
    pub preview_size: u32,
}

impl PhotoSpec {
    /// 600x600 px, 240 KB, 2x2 inch at 300 dpi.
    pub fn bls_canada() -> Self {
        Self {
            target_width: 600,
            target_height: 600,
            max_dimension: 5000,
            max_bytes: 240 * 1024,
            initial_quality: 95,
            fallback_qualities: vec![90, 80, 70, 60, 50, 40, 30, 20],
            preview_size: 150,
        }
    }

    /// Preset with `TARGET_SIZE` (square edge) and `MAX_KB` overrides.
    pub fn from_env() -> Result<Self> {
        let mut spec = Self::bls_canada();

        if let Ok(size) = std::env::var("TARGET_SIZE") {
            let size: u32 = size
                .parse()
                .map_err(|_| PipelineError::InvalidSpec(format!("TARGET_SIZE '{size}' is not a number")))?;
            spec.target_width = size;
            spec.target_height = size;
        }

        if let Ok(kb) = std::env::var("MAX_KB") {
            spec.max_bytes = budget_from_kb(&kb)?;
        }

        spec.validate()?;
        Ok(spec)
    }

    /// Check that the preset can actually be applied.
    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(PipelineError::InvalidSpec("target size must be non-zero".into()));
        }
        if self.max_dimension == 0 || self.max_bytes == 0 || self.preview_size == 0 {
            return Err(PipelineError::InvalidSpec(
                "dimension, byte and preview limits must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.initial_quality) {
            return Err(PipelineError::InvalidSpec(format!(
                "initial quality {} is outside 1..=100",
                self.initial_quality
            )));
        }

        let mut previous = self.initial_quality;
        for &quality in &self.fallback_qualities {
            if quality == 0 || quality >= previous {
                return Err(PipelineError::InvalidSpec(format!(
                    "fallback quality {quality} must be non-zero and below {previous}"
                )));
            }
            previous = quality;
        }

        Ok(())
    }

    /// Budget expressed in kilobytes, for messages.
    #[allow(clippy::cast_precision_loss)]
    pub fn max_kb(&self) -> f64 {
        self.max_bytes as f64 / 1024.0
    }
}

/// Parse a `MAX_KB` value into a byte budget.
fn budget_from_kb(kb: &str) -> Result<usize> {
    let parsed: usize = kb
        .parse()
        .map_err(|_| PipelineError::InvalidSpec(format!("MAX_KB '{kb}' is not a number")))?;
    parsed
        .checked_mul(1024)
        .ok_or_else(|| PipelineError::InvalidSpec(format!("MAX_KB '{kb}' is too large")))
}

impl Default for PhotoSpec {
    fn default() -> Self {
        Self::bls_canada()
    }
}
