//! Pixel transforms that the `image` crate does not provide directly.
//!
//! The enhancers blend the source with a degenerate image:
//! `out = degenerate + factor * (src - degenerate)`, clamped to `0..=255`.
//! Colour uses the luminance copy as the degenerate image, contrast a flat
//! grey at the mean luminance, brightness black.

use image::{ColorType, DynamicImage, Rgba, RgbaImage};

pub const POSTERIZE_BITS: u8 = 5;
pub const BLUR_RADIUS: f32 = 4.0;
pub const ENHANCE_FACTOR: f32 = 1.5;

const EMBOSS_OFFSET: i32 = 128;

/// ITU-R 601-2 luma, integer weights summing to 1000.
fn luma(p: &Rgba<u8>) -> u8 {
    ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8
}

fn blend(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + factor * (value as f32 - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Convert a working RGBA buffer back to the channel layout of the source.
fn restore_layout(color: ColorType, rgba: RgbaImage) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(rgba);
    match color {
        ColorType::L8 | ColorType::L16 => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorType::La8 | ColorType::La16 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        c if c.has_alpha() => img,
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// Apply `f` to each pixel's colour channels; alpha is left alone.
fn map_colors(img: &DynamicImage, f: impl Fn(&Rgba<u8>) -> [u8; 3]) -> DynamicImage {
    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b] = f(pixel);
        *pixel = Rgba([r, g, b, pixel[3]]);
    }
    restore_layout(img.color(), rgba)
}

/// Keep the `bits` most significant bits of every colour channel.
pub fn posterize(img: &DynamicImage, bits: u8) -> DynamicImage {
    let bits = bits.clamp(1, 8);
    let mask = !0xFFu8.checked_shr(bits as u32).unwrap_or(0);
    map_colors(img, |p| [p[0] & mask, p[1] & mask, p[2] & mask])
}

/// 3x3 emboss: `[-1 0 0; 0 1 0; 0 0 0]`, offset 128. The outermost
/// rows and columns are copied unchanged.
pub fn emboss(img: &DynamicImage) -> DynamicImage {
    let src = img.to_rgba8();
    let (width, height) = src.dimensions();
    let mut out = src.clone();

    if width >= 3 && height >= 3 {
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let center = src.get_pixel(x, y);
                let upper_left = src.get_pixel(x - 1, y - 1);
                let mut pixel = *center;
                for c in 0..3 {
                    let v = center[c] as i32 - upper_left[c] as i32 + EMBOSS_OFFSET;
                    pixel[c] = v.clamp(0, 255) as u8;
                }
                out.put_pixel(x, y, pixel);
            }
        }
    }

    restore_layout(img.color(), out)
}

/// Scale saturation: blend with the luminance of each pixel.
pub fn enhance_color(img: &DynamicImage, factor: f32) -> DynamicImage {
    map_colors(img, |p| {
        let l = luma(p) as f32;
        [blend(l, p[0], factor), blend(l, p[1], factor), blend(l, p[2], factor)]
    })
}

/// Scale contrast around the mean luminance of the whole image.
pub fn enhance_contrast(img: &DynamicImage, factor: f32) -> DynamicImage {
    let rgba = img.to_rgba8();
    let count = (rgba.width() as f64 * rgba.height() as f64).max(1.0);
    let sum: f64 = rgba.pixels().map(|p| luma(p) as f64).sum();
    let mean = (sum / count + 0.5).floor() as f32;

    map_colors(img, |p| {
        [blend(mean, p[0], factor), blend(mean, p[1], factor), blend(mean, p[2], factor)]
    })
}

/// Scale brightness: blend with black.
pub fn enhance_brightness(img: &DynamicImage, factor: f32) -> DynamicImage {
    map_colors(img, |p| {
        [blend(0.0, p[0], factor), blend(0.0, p[1], factor), blend(0.0, p[2], factor)]
    })
}
