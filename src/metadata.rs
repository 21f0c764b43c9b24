//! EXIF extraction from uploaded payloads.
//!
//! Missing camera metadata is the normal case (screenshots, graphics,
//! re-uploads of edited files) and yields empty attributes. Only a payload
//! that cannot be decoded as an image is an error.

use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use crate::error::{PixlyError, PixlyResult};

/// Normalized camera attributes. Every field is optional; a default value
/// means no recognized tag was present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifAttributes {
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub iso: Option<i64>,
    pub flash: Option<i64>,
    pub pic_width: Option<i64>,
    pub pic_height: Option<i64>,

    /// Exposure time in seconds
    pub shutter_speed: Option<f64>,
    /// F-number
    pub aperture: Option<f64>,
    /// "lat,lon" in decimal degrees
    pub location: Option<String>,
}

impl ExifAttributes {
    pub fn is_empty(&self) -> bool {
        *self == ExifAttributes::default()
    }
}

/// What an upload looks like once decoded.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
    pub exif: ExifAttributes,
}

/// Read the camera attributes embedded in `bytes`.
pub fn extract(bytes: &[u8]) -> PixlyResult<ExifAttributes> {
    inspect(bytes).map(|info| info.exif)
}

/// Decode `bytes` fully and read its camera attributes.
pub fn inspect(bytes: &[u8]) -> PixlyResult<ImageInfo> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PixlyError::CorruptImage(e.to_string()))?;
    let format = reader.format();
    let image = reader
        .decode()
        .map_err(|e| PixlyError::CorruptImage(e.to_string()))?;

    Ok(ImageInfo {
        width: image.width(),
        height: image.height(),
        format,
        exif: read_exif(bytes),
    })
}

fn read_exif(bytes: &[u8]) -> ExifAttributes {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return ExifAttributes::default(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable EXIF block: {}", e);
            return ExifAttributes::default();
        }
    };

    let field = |tag: exif::Tag| exif.get_field(tag, exif::In::PRIMARY);

    ExifAttributes {
        date_time: field(exif::Tag::DateTime).and_then(ascii_value),
        camera_make: field(exif::Tag::Make).and_then(ascii_value),
        camera_model: field(exif::Tag::Model).and_then(ascii_value),
        iso: field(exif::Tag::PhotographicSensitivity).and_then(uint_value),
        flash: field(exif::Tag::Flash).and_then(uint_value),
        pic_width: field(exif::Tag::PixelXDimension).and_then(uint_value),
        pic_height: field(exif::Tag::PixelYDimension).and_then(uint_value),
        shutter_speed: field(exif::Tag::ExposureTime).and_then(rational_value),
        aperture: field(exif::Tag::FNumber).and_then(rational_value),
        location: gps_location(&exif),
    }
}

/// First ASCII component, verbatim (no date reformatting).
fn ascii_value(field: &exif::Field) -> Option<String> {
    match field.value {
        exif::Value::Ascii(ref parts) => parts
            .first()
            .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\0').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn uint_value(field: &exif::Field) -> Option<i64> {
    field.value.get_uint(0).map(i64::from)
}

fn rational_value(field: &exif::Field) -> Option<f64> {
    match field.value {
        exif::Value::Rational(ref v) => v
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| r.num as f64 / r.denom as f64),
        _ => None,
    }
}

fn gps_location(exif: &exif::Exif) -> Option<String> {
    let lat = exif.get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY)?;
    let lat_ref = exif.get_field(exif::Tag::GPSLatitudeRef, exif::In::PRIMARY)?;
    let lon = exif.get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY)?;
    let lon_ref = exif.get_field(exif::Tag::GPSLongitudeRef, exif::In::PRIMARY)?;

    let lat = dms_field(lat)?;
    let lon = dms_field(lon)?;
    let lat = if ascii_value(lat_ref)?.contains('S') { -lat } else { lat };
    let lon = if ascii_value(lon_ref)?.contains('W') { -lon } else { lon };

    Some(format!("{:.6},{:.6}", lat, lon))
}

fn dms_field(field: &exif::Field) -> Option<f64> {
    match field.value {
        exif::Value::Rational(ref v) if v.len() >= 3 && v.iter().all(|r| r.denom != 0) => {
            Some(dms_to_decimal(v[0].to_f64(), v[1].to_f64(), v[2].to_f64()))
        }
        _ => None,
    }
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}
