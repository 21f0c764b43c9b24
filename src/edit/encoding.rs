//! Canonical storage encoding.
//!
//! Every edited object is written in one raster format, whatever format it
//! was uploaded in. The first edit of a JPEG upload therefore also converts
//! it; that conversion is this module's job, not a side effect.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat};

use crate::config::{EditConfig, EncodingFormat};
use crate::error::{PixlyError, PixlyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonicalEncoding {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

impl CanonicalEncoding {
    pub fn from_config(config: &EditConfig) -> Self {
        match config.encoding {
            EncodingFormat::Png => CanonicalEncoding::Png,
            EncodingFormat::Jpeg => CanonicalEncoding::Jpeg {
                quality: config.jpeg_quality.clamp(1, 100),
            },
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            CanonicalEncoding::Png => ImageFormat::Png,
            CanonicalEncoding::Jpeg { .. } => ImageFormat::Jpeg,
        }
    }

    /// File extension for staged copies
    pub fn extension(&self) -> &'static str {
        match self {
            CanonicalEncoding::Png => "png",
            CanonicalEncoding::Jpeg { .. } => "jpg",
        }
    }

    pub fn encode(&self, img: &DynamicImage) -> PixlyResult<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self {
            CanonicalEncoding::Png => img.write_with_encoder(PngEncoder::new(&mut out)),
            CanonicalEncoding::Jpeg { quality } => {
                // JPEG carries neither alpha nor 16-bit samples.
                let flattened = if img.color().has_color() {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                } else {
                    DynamicImage::ImageLuma8(img.to_luma8())
                };
                flattened.write_with_encoder(JpegEncoder::new_with_quality(&mut out, *quality))
            }
        };
        result.map_err(|e| PixlyError::Encode(e.to_string()))?;
        Ok(out)
    }
}
