//! Upload Preview Thumbnails

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{imageops::FilterType, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::{encode_jpeg, ProcessedImage};

const PREVIEW_QUALITY: u8 = 80;

/// Small base64 JPEG for showing the result before payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub jpeg_base64: String,
}

impl Preview {
    /// `data:` URI usable directly as an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.jpeg_base64)
    }
}

/// Square thumbnail of a processed photo.
pub fn preview(image: &ProcessedImage, size: u32) -> Result<Preview> {
    let decoded = image::load_from_memory_with_format(&image.bytes, ImageFormat::Jpeg)
        .map_err(|e| PipelineError::Decode(e.to_string()))?
        .into_rgb8();

    let thumbnail = image::imageops::resize(&decoded, size, size, FilterType::Triangle);
    let bytes = encode_jpeg(&thumbnail, PREVIEW_QUALITY)?;

    Ok(Preview {
        width: size,
        height: size,
        jpeg_base64: STANDARD.encode(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{process, PhotoSpec};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_preview_is_small_jpeg() {
        let source = RgbImage::from_fn(900, 600, |x, _| Rgb([(x % 256) as u8, 40, 200]));
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(source)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let spec = PhotoSpec::bls_canada();
        let processed = process(&png, "png", &spec).unwrap();
        let thumb = preview(&processed, spec.preview_size).unwrap();

        let jpeg = STANDARD.decode(&thumb.jpeg_base64).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 150));
        assert!(thumb.data_uri().starts_with("data:image/jpeg;base64,"));
    }
}
