//! Image edit pipeline.
//!
//! [`EditEngine`] is the pure part: bytes in, one operation, bytes out.
//! [`EditOrchestrator`] runs an edit against the object store.
//!
//! Operations apply to whatever is currently stored. There is no edit
//! history, so repeating an operation compounds it (two blurs are blurrier
//! than one) and rotations change the stored canvas for good.

pub mod encoding;
pub mod locks;
pub mod ops;
pub mod orchestrator;

use image::{DynamicImage, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::error::{PixlyError, PixlyResult};

pub use encoding::CanonicalEncoding;
pub use locks::IdLocks;
pub use orchestrator::EditOrchestrator;

/// The closed set of supported edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOperation {
    Grayscale,
    Left,
    Right,
    Posterize,
    Emboss,
    Blur,
    Color,
    Contrast,
    Brightness,
}

impl EditOperation {
    pub const ALL: [EditOperation; 9] = [
        EditOperation::Grayscale,
        EditOperation::Left,
        EditOperation::Right,
        EditOperation::Posterize,
        EditOperation::Emboss,
        EditOperation::Blur,
        EditOperation::Color,
        EditOperation::Contrast,
        EditOperation::Brightness,
    ];

    /// Name used in URLs.
    pub fn name(&self) -> &'static str {
        match self {
            EditOperation::Grayscale => "grayscale",
            EditOperation::Left => "left",
            EditOperation::Right => "right",
            EditOperation::Posterize => "posterize",
            EditOperation::Emboss => "emboss",
            EditOperation::Blur => "blur",
            EditOperation::Color => "color",
            EditOperation::Contrast => "contrast",
            EditOperation::Brightness => "brightness",
        }
    }

    pub fn transform(&self, img: &DynamicImage) -> DynamicImage {
        match self {
            EditOperation::Grayscale => img.grayscale(),
            EditOperation::Left => img.rotate270(),
            EditOperation::Right => img.rotate90(),
            EditOperation::Posterize => ops::posterize(img, ops::POSTERIZE_BITS),
            EditOperation::Emboss => ops::emboss(img),
            EditOperation::Blur => img.blur(ops::BLUR_RADIUS),
            EditOperation::Color => ops::enhance_color(img, ops::ENHANCE_FACTOR),
            EditOperation::Contrast => ops::enhance_contrast(img, ops::ENHANCE_FACTOR),
            EditOperation::Brightness => ops::enhance_brightness(img, ops::ENHANCE_FACTOR),
        }
    }
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EditOperation {
    type Err = PixlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EditOperation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| PixlyError::UnsupportedOperation(s.to_string()))
    }
}

/// Decode, transform, re-encode. Stateless and deterministic.
#[derive(Debug, Clone, Default)]
pub struct EditEngine {
    encoding: CanonicalEncoding,
}

impl EditEngine {
    pub fn new(encoding: CanonicalEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> &CanonicalEncoding {
        &self.encoding
    }

    pub fn apply(&self, bytes: &[u8], op: EditOperation) -> PixlyResult<Vec<u8>> {
        let img = decode(bytes)?;
        let edited = op.transform(&img);
        self.encoding.encode(&edited)
    }
}

/// Decode a stored payload in whatever format it was uploaded in.
pub fn decode(bytes: &[u8]) -> PixlyResult<DynamicImage> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PixlyError::CorruptImage(e.to_string()))?
        .decode()
        .map_err(|e| PixlyError::CorruptImage(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};

    /// Colourful PNG with a gradient so every transform changes something.
    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 256) as u8,
                255,
            ])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_parse_every_operation() {
        for op in EditOperation::ALL {
            assert_eq!(op.name().parse::<EditOperation>().unwrap(), op);
            assert_eq!(op.to_string(), op.name());
        }
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let err = "sepia".parse::<EditOperation>().unwrap_err();
        assert!(matches!(err, PixlyError::UnsupportedOperation(ref name) if name == "sepia"));
        assert!("Grayscale".parse::<EditOperation>().is_err());
    }

    #[test]
    fn test_apply_is_deterministic() {
        let engine = EditEngine::default();
        let input = sample_png(24, 16);
        for op in EditOperation::ALL {
            let first = engine.apply(&input, op).unwrap();
            let second = engine.apply(&input, op).unwrap();
            assert_eq!(first, second, "{op} is not deterministic");
        }
    }

    #[test]
    fn test_single_rotation_swaps_canvas() {
        let engine = EditEngine::default();
        let input = sample_png(30, 20);
        for op in [EditOperation::Left, EditOperation::Right] {
            let out = decode(&engine.apply(&input, op).unwrap()).unwrap();
            assert_eq!(out.dimensions(), (20, 30));
        }
    }

    #[test]
    fn test_rotation_roundtrip_restores_canvas_and_pixels() {
        let engine = EditEngine::default();
        let input = sample_png(30, 20);
        let left = engine.apply(&input, EditOperation::Left).unwrap();
        let back = engine.apply(&left, EditOperation::Right).unwrap();

        let original = decode(&input).unwrap();
        let restored = decode(&back).unwrap();
        assert_eq!(restored.dimensions(), (30, 20));
        assert_eq!(restored.to_rgba8(), original.to_rgba8());
    }

    #[test]
    fn test_left_rotates_counter_clockwise() {
        // Top-left pixel ends up bottom-left after a counter-clockwise turn.
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let rotated = EditOperation::Left.transform(&DynamicImage::ImageRgba8(img));
        assert_eq!(rotated.dimensions(), (2, 3));
        assert_eq!(rotated.get_pixel(0, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_grayscale_has_no_saturation() {
        let engine = EditEngine::default();
        let input = sample_png(20, 10);
        let out = decode(&engine.apply(&input, EditOperation::Grayscale).unwrap()).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
        for pixel in out.to_rgb8().pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[test]
    fn test_repeated_blur_compounds() {
        let engine = EditEngine::default();
        let input = sample_png(32, 32);
        let once = engine.apply(&input, EditOperation::Blur).unwrap();
        let twice = engine.apply(&once, EditOperation::Blur).unwrap();
        assert_ne!(once, twice);
    }

    #[test]
    fn test_first_edit_transcodes_to_canonical_format() {
        let engine = EditEngine::default();
        let jpeg = crate::metadata::tests::plain_jpeg(16, 8);
        let out = engine.apply(&jpeg, EditOperation::Brightness).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_corrupt_payload() {
        let engine = EditEngine::default();
        let err = engine.apply(b"\x89PNG\r\n\x1a\n", EditOperation::Blur).unwrap_err();
        assert!(matches!(err, PixlyError::CorruptImage(_)));
    }
}
