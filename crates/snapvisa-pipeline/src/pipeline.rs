//! Resize and Compress-to-Budget
//!
//! ```text
//! bytes ──▶ validate ──▶ decode ──▶ flatten ──▶ resize_exact ──▶ encode@95
//!                                                                   │
//!                                       fits? ◀──────────────────────┘
//!                                         │ no
//!                                         ▼
//!                           encode@90, @80, ... first fit wins
//!                           (lowest quality + warning if none fit)
//! ```
//!
//! Everything here is synchronous and CPU bound. Callers on an async runtime
//! should run [`process`] on a blocking thread.

use std::io::Cursor;

use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ExtendedColorType,
    ImageReader, Rgb, RgbImage, Rgba,
};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::format::{check_declared, UploadFormat};
use crate::spec::PhotoSpec;

/// How the final encode relates to the byte budget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompressionOutcome {
    /// First encode already fit
    WithinBudget,

    /// A fallback quality was needed
    Compressed { quality: u8 },

    /// Nothing fit; the lowest-quality encode is kept anyway
    OverBudget,
}

/// One encode of the resized bitmap
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeAttempt {
    pub quality: u8,
    pub size_bytes: usize,
}

/// Result of [`compress_to_budget`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub outcome: CompressionOutcome,
    pub attempts: Vec<EncodeAttempt>,
}

/// A photo resized to spec and re-encoded as JPEG
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedImage {
    /// JPEG bytes
    pub bytes: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// JPEG quality of `bytes`
    pub quality: u8,

    pub outcome: CompressionOutcome,

    /// Every encode tried, in order
    pub attempts: Vec<EncodeAttempt>,

    /// Format the user uploaded
    pub source_format: UploadFormat,

    /// Budget the image was compressed against
    pub max_bytes: usize,
}

impl std::fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("size_bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("quality", &self.quality)
            .field("outcome", &self.outcome)
            .field("source_format", &self.source_format)
            .finish_non_exhaustive()
    }
}

impl ProcessedImage {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn size_kb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }

    pub const fn is_over_budget(&self) -> bool {
        matches!(self.outcome, CompressionOutcome::OverBudget)
    }

    /// User-facing note about compression, if any was needed.
    #[allow(clippy::cast_precision_loss)]
    pub fn notice(&self) -> Option<String> {
        let max_kb = self.max_bytes as f64 / 1024.0;
        match self.outcome {
            CompressionOutcome::WithinBudget => None,
            CompressionOutcome::Compressed { quality } => Some(format!(
                "Compressed image to {:.2} KB using quality={quality}.",
                self.size_kb()
            )),
            CompressionOutcome::OverBudget => Some(format!(
                "Unable to compress under {max_kb:.0} KB even at low quality. \
                 Consider uploading a simpler image."
            )),
        }
    }
}

/// Validate, resize and compress an uploaded photo.
///
/// `extension` is the extension of the uploaded file name. Identical input
/// and spec always produce identical bytes.
pub fn process(bytes: &[u8], extension: &str, spec: &PhotoSpec) -> Result<ProcessedImage> {
    let format = check_declared(bytes, extension)?;

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format.image_format())
        .into_dimensions()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    if width > spec.max_dimension || height > spec.max_dimension {
        return Err(PipelineError::DimensionsTooLarge {
            width,
            height,
            max: spec.max_dimension,
        });
    }

    let decoded = image::load_from_memory_with_format(bytes, format.image_format())
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    let rgb = flatten_onto_white(decoded);
    let resized = image::imageops::resize(
        &rgb,
        spec.target_width,
        spec.target_height,
        FilterType::Lanczos3,
    );

    let compressed = compress_to_budget(&resized, spec)?;

    tracing::info!(
        source = format.name(),
        source_width = width,
        source_height = height,
        quality = compressed.quality,
        size_bytes = compressed.bytes.len(),
        outcome = ?compressed.outcome,
        "Processed photo"
    );

    Ok(ProcessedImage {
        bytes: compressed.bytes,
        width: spec.target_width,
        height: spec.target_height,
        quality: compressed.quality,
        outcome: compressed.outcome,
        attempts: compressed.attempts,
        source_format: format,
        max_bytes: spec.max_bytes,
    })
}

/// Encode at the initial quality, then walk the fallback ladder until the
/// result fits `spec.max_bytes`.
pub fn compress_to_budget(image: &RgbImage, spec: &PhotoSpec) -> Result<Compressed> {
    let first = encode_jpeg(image, spec.initial_quality)?;
    let mut attempts = vec![EncodeAttempt {
        quality: spec.initial_quality,
        size_bytes: first.len(),
    }];

    if first.len() <= spec.max_bytes {
        return Ok(Compressed {
            bytes: first,
            quality: spec.initial_quality,
            outcome: CompressionOutcome::WithinBudget,
            attempts,
        });
    }

    tracing::debug!(
        size_bytes = first.len(),
        max_bytes = spec.max_bytes,
        "Initial encode over budget, compressing"
    );

    let mut smallest = (spec.initial_quality, first);
    for &quality in &spec.fallback_qualities {
        let bytes = encode_jpeg(image, quality)?;
        attempts.push(EncodeAttempt {
            quality,
            size_bytes: bytes.len(),
        });

        if bytes.len() <= spec.max_bytes {
            return Ok(Compressed {
                bytes,
                quality,
                outcome: CompressionOutcome::Compressed { quality },
                attempts,
            });
        }
        smallest = (quality, bytes);
    }

    let (quality, bytes) = smallest;
    tracing::warn!(
        quality,
        size_bytes = bytes.len(),
        max_bytes = spec.max_bytes,
        "Could not compress photo under budget"
    );

    Ok(Compressed {
        bytes,
        quality,
        outcome: CompressionOutcome::OverBudget,
        attempts,
    })
}

/// Baseline JPEG encode of an RGB bitmap.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
            .map_err(|e| PipelineError::Encode(e.to_string()))?;
    }
    Ok(buf)
}

/// Drop the alpha channel, compositing over the white photo background.
fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = u16::from(a);
        let blend = |c: u8| {
            let mixed = (u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255;
            u8::try_from(mixed).unwrap_or(u8::MAX)
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    /// Deterministic noise, which JPEG compresses poorly.
    fn noisy(width: u32, height: u32) -> RgbImage {
        let mut seed: u32 = 0x1234_5678;
        RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 24) as u8
            };
            Rgb([next(), next(), next()])
        })
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn decoded_dimensions(jpeg: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_output_is_exact_target_for_any_aspect() {
        let spec = PhotoSpec::bls_canada();

        let landscape = encode(DynamicImage::ImageRgb8(gradient(1200, 800)), ImageFormat::Jpeg);
        let out = process(&landscape, "jpg", &spec).unwrap();
        assert_eq!((out.width, out.height), (600, 600));
        assert_eq!(decoded_dimensions(&out.bytes), (600, 600));

        let portrait = encode(DynamicImage::ImageRgb8(gradient(300, 900)), ImageFormat::Png);
        let out = process(&portrait, "PNG", &spec).unwrap();
        assert_eq!(decoded_dimensions(&out.bytes), (600, 600));
        assert_eq!(out.source_format, UploadFormat::Png);
    }

    #[test]
    fn test_custom_target_resolution() {
        let spec = PhotoSpec {
            target_width: 413,
            target_height: 531,
            ..PhotoSpec::bls_canada()
        };
        let png = encode(DynamicImage::ImageRgb8(gradient(640, 480)), ImageFormat::Png);
        let out = process(&png, "png", &spec).unwrap();
        assert_eq!(decoded_dimensions(&out.bytes), (413, 531));
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let spec = PhotoSpec::bls_canada();
        let wide = encode(DynamicImage::ImageRgb8(gradient(5001, 4)), ImageFormat::Png);
        let err = process(&wide, "png", &spec).unwrap_err();
        assert_eq!(
            err,
            PipelineError::DimensionsTooLarge {
                width: 5001,
                height: 4,
                max: 5000
            }
        );

        let edge = encode(DynamicImage::ImageRgb8(gradient(5000, 4)), ImageFormat::Png);
        assert!(process(&edge, "png", &spec).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_and_unsupported() {
        let spec = PhotoSpec::bls_canada();
        let png = encode(DynamicImage::ImageRgb8(gradient(64, 64)), ImageFormat::Png);

        assert!(matches!(
            process(&png, "jpg", &spec),
            Err(PipelineError::FormatMismatch { .. })
        ));
        assert!(matches!(
            process(&png, "webp", &spec),
            Err(PipelineError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_truncated_upload_is_decode_error() {
        let spec = PhotoSpec::bls_canada();
        let mut jpeg = encode(DynamicImage::ImageRgb8(gradient(64, 64)), ImageFormat::Jpeg);
        jpeg.truncate(20);
        let err = process(&jpeg, "jpg", &spec).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_idempotent() {
        let spec = PhotoSpec::bls_canada();
        let jpeg = encode(DynamicImage::ImageRgb8(noisy(800, 700)), ImageFormat::Jpeg);

        let a = process(&jpeg, "jpeg", &spec).unwrap();
        let b = process(&jpeg, "jpeg", &spec).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.quality, b.quality);
    }

    #[test]
    fn test_smooth_photo_fits_at_initial_quality() {
        let spec = PhotoSpec::bls_canada();
        let compressed = compress_to_budget(&gradient(600, 600), &spec).unwrap();

        assert_eq!(compressed.outcome, CompressionOutcome::WithinBudget);
        assert_eq!(compressed.quality, 95);
        assert_eq!(compressed.attempts.len(), 1);
    }

    #[test]
    fn test_ladder_stops_at_first_fit() {
        let image = noisy(600, 600);
        let at_95 = encode_jpeg(&image, 95).unwrap().len();
        let at_90 = encode_jpeg(&image, 90).unwrap().len();
        let at_80 = encode_jpeg(&image, 80).unwrap().len();
        assert!(at_95 > at_80 && at_90 > at_80);

        let spec = PhotoSpec {
            max_bytes: at_80,
            ..PhotoSpec::bls_canada()
        };
        let compressed = compress_to_budget(&image, &spec).unwrap();

        assert_eq!(compressed.outcome, CompressionOutcome::Compressed { quality: 80 });
        assert_eq!(compressed.bytes.len(), at_80);
        let qualities: Vec<u8> = compressed.attempts.iter().map(|a| a.quality).collect();
        assert_eq!(qualities, vec![95, 90, 80]);
    }

    #[test]
    fn test_exhausted_ladder_keeps_lowest_quality() {
        let image = noisy(600, 600);
        let spec = PhotoSpec {
            max_bytes: 1,
            ..PhotoSpec::bls_canada()
        };
        let compressed = compress_to_budget(&image, &spec).unwrap();

        assert_eq!(compressed.outcome, CompressionOutcome::OverBudget);
        assert_eq!(compressed.quality, 20);
        assert_eq!(compressed.attempts.len(), 1 + spec.fallback_qualities.len());
        assert!(compressed
            .attempts
            .windows(2)
            .all(|pair| pair[0].quality > pair[1].quality));
    }

    #[test]
    fn test_compressed_notice_text() {
        let processed = |outcome| ProcessedImage {
            bytes: vec![0; 100 * 1024],
            width: 600,
            height: 600,
            quality: 80,
            outcome,
            attempts: Vec::new(),
            source_format: UploadFormat::Jpeg,
            max_bytes: 240 * 1024,
        };

        assert_eq!(
            processed(CompressionOutcome::Compressed { quality: 80 }).notice().as_deref(),
            Some("Compressed image to 100.00 KB using quality=80.")
        );
        assert_eq!(processed(CompressionOutcome::WithinBudget).notice(), None);
    }

    #[test]
    fn test_notice_text() {
        let spec = PhotoSpec {
            max_bytes: 1,
            ..PhotoSpec::bls_canada()
        };
        let jpeg = encode(DynamicImage::ImageRgb8(noisy(300, 300)), ImageFormat::Jpeg);
        let out = process(&jpeg, "jpg", &spec).unwrap();

        assert!(out.is_over_budget());
        assert!(out.notice().unwrap().starts_with("Unable to compress under 0 KB"));
    }

    #[test]
    fn test_transparent_png_becomes_white() {
        let clear = image::RgbaImage::from_pixel(80, 80, Rgba([0, 0, 0, 0]));
        let png = encode(DynamicImage::ImageRgba8(clear), ImageFormat::Png);
        let out = process(&png, "png", &PhotoSpec::bls_canada()).unwrap();

        let decoded = image::load_from_memory_with_format(&out.bytes, ImageFormat::Jpeg)
            .unwrap()
            .into_rgb8();
        let Rgb([r, g, b]) = *decoded.get_pixel(300, 300);
        assert!(r > 245 && g > 245 && b > 245);
    }
}
