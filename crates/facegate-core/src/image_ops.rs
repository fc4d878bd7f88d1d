//! Image helpers: payload decoding, black-frame detection and face crops.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageError, ImageFormat, RgbImage};

use crate::types::{FaceBox, Image};

/// Upper bound (exclusive) of the luminance range for a frame to count as black.
const BLACK_MAX_LUMA: u8 = 5;

/// Decode an encoded image container into a 3-channel image.
///
/// Images with an alpha channel have their colour zeroed wherever alpha is
/// fully transparent before the alpha channel is dropped.
pub fn decode_image(bytes: &[u8]) -> Result<Image, ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    if !decoded.color().has_alpha() {
        return Ok(decoded.to_rgb8());
    }

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let out = if a == 0 { [0, 0, 0] } else { [r, g, b] };
        rgb.put_pixel(x, y, image::Rgb(out));
    }
    Ok(rgb)
}

/// ITU-R 601 luma, rounded to nearest like the usual 8-bit greyscale conversion.
fn luma(px: &image::Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

/// Minimum and maximum luma over the image, or `None` for an empty image.
pub fn luma_extrema(img: &Image) -> Option<(u8, u8)> {
    img.pixels().fold(None, |acc, px| {
        let l = luma(px);
        Some(match acc {
            None => (l, l),
            Some((lo, hi)) => (lo.min(l), hi.max(l)),
        })
    })
}

/// Check if an image is (almost) entirely black.
///
/// True when the darkest pixel is 0 and the brightest stays below 5.
pub fn is_black_image(img: &Image) -> bool {
    match luma_extrema(img) {
        None => true,
        Some((lo, hi)) => lo == 0 && hi < BLACK_MAX_LUMA,
    }
}

/// Cut the face region out of the image and return it as a JPEG data URL.
///
/// The box is clamped to the image bounds.
pub fn crop_face_data_url(img: &Image, face: &FaceBox) -> Result<String, ImageError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        )));
    }
    let left = face.left.min(width - 1);
    let top = face.top.min(height - 1);
    let right = face.right.clamp(left, width - 1);
    let bottom = face.bottom.clamp(top, height - 1);

    let crop = image::imageops::crop_imm(img, left, top, right - left + 1, bottom - top + 1).to_image();

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(crop).write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(to_data_url("image/jpeg", &buf))
}

/// Wrap raw bytes as a `data:<mime>;base64,<payload>` URL.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}
