//! Input validation: media type resolution and payload decoding.
//!
//! A sample declares its media type in up to two places: embedded in a
//! `data:` URL payload and in the `mime_type` metadata field. Both are
//! checked for agreement before the payload is decoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::ValidationError;
use crate::image_ops;
use crate::types::{Image, Sample};

/// A decoded sample image together with its effective media type.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub image: Image,
    pub mime_type: String,
}

/// Media type embedded in a `data:<mime>;base64,...` payload, if any.
pub fn embedded_mimetype(data: &str) -> Option<&str> {
    let header = data.split(',').next()?;
    let mime = header.split(';').next()?.split(':').nth(1)?;
    // Blank counts as absent; anything else is compared verbatim.
    if mime.trim().is_empty() {
        None
    } else {
        Some(mime)
    }
}

/// Base64 part of the payload: whatever follows the first comma, or the whole string.
fn payload_base64(data: &str) -> &str {
    data.split(',').nth(1).unwrap_or(data)
}

/// Resolve the effective media type of a sample against the accepted set.
pub fn resolve_mimetype(sample: &Sample, accepted: &[String]) -> Result<String, ValidationError> {
    let embedded = sample.data.as_deref().and_then(embedded_mimetype);
    let declared = sample.mime_type.as_deref();

    if let (Some(embedded), Some(declared)) = (embedded, declared) {
        if embedded != declared {
            return Err(ValidationError::MimetypeMismatch {
                embedded: embedded.to_string(),
                declared: declared.to_string(),
            });
        }
    }

    let mime = declared.or(embedded).ok_or(ValidationError::MissingMimetype)?;
    if !accepted.iter().any(|a| a == mime) {
        return Err(ValidationError::UnsupportedMimetype {
            mimetype: mime.to_string(),
            accepted: accepted.to_vec(),
        });
    }
    Ok(mime.to_string())
}

/// Decode the sample payload (base64 → bytes → image).
pub fn decode_sample_image(sample: &Sample) -> Result<Image, ValidationError> {
    let data = sample.data.as_deref().ok_or(ValidationError::InvalidSampleData)?;
    let encoded: String = payload_base64(data)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|_| ValidationError::InvalidSampleData)?;
    image_ops::decode_image(&bytes).map_err(|_| ValidationError::InvalidSampleData)
}

/// Full validation: media type policy first, then payload decoding.
pub fn check_sample_image(sample: &Sample, accepted: &[String]) -> Result<ResolvedImage, ValidationError> {
    let mime_type = resolve_mimetype(sample, accepted)?;
    let image = decode_sample_image(sample)?;
    Ok(ResolvedImage { image, mime_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn accepted() -> Vec<String> {
        vec!["image/jpeg".to_string(), "image/png".to_string()]
    }

    fn png_base64() -> String {
        let img = RgbImage::from_pixel(4, 4, Rgb([90, 90, 90]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        STANDARD.encode(buf)
    }

    fn sample(data: Option<String>, mime_type: Option<&str>) -> Sample {
        Sample {
            id: "1".into(),
            learner_id: "learner".into(),
            data,
            mime_type: mime_type.map(str::to_string),
            validations: Vec::new(),
        }
    }

    #[test]
    fn test_embedded_mimetype_parsing() {
        assert_eq!(embedded_mimetype("data:image/png;base64,AAAA"), Some("image/png"));
        assert_eq!(embedded_mimetype("AAAA"), None);
        assert_eq!(embedded_mimetype("data:;base64,AAAA"), None);
        assert_eq!(embedded_mimetype("data: ;base64,AAAA"), None);
        assert_eq!(embedded_mimetype("data: image/png;base64,AAAA"), Some(" image/png"));
    }

    #[test]
    fn test_padded_embedded_mimetype_mismatches_declared() {
        let s = sample(
            Some(format!("data: image/png;base64,{}", png_base64())),
            Some("image/png"),
        );
        assert!(matches!(
            resolve_mimetype(&s, &accepted()),
            Err(ValidationError::MimetypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_mimetype() {
        let s = sample(Some(png_base64()), None);
        assert_eq!(resolve_mimetype(&s, &accepted()), Err(ValidationError::MissingMimetype));
    }

    #[test]
    fn test_mismatched_mimetypes_rejected_before_decoding() {
        let s = sample(Some("data:image/jpeg;base64,not-even-base64".into()), Some("image/png"));
        let err = check_sample_image(&s, &accepted()).unwrap_err();
        assert!(matches!(err, ValidationError::MimetypeMismatch { .. }));
    }

    #[test]
    fn test_unsupported_mimetype() {
        let s = sample(Some(format!("data:image/other;base64,{}", png_base64())), Some("image/other"));
        let err = check_sample_image(&s, &accepted()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedMimetype { .. }));
    }

    #[test]
    fn test_metadata_only_mimetype_with_bare_base64() {
        let s = sample(Some(png_base64()), Some("image/png"));
        let resolved = check_sample_image(&s, &accepted()).unwrap();
        assert_eq!(resolved.mime_type, "image/png");
        assert_eq!(resolved.image.dimensions(), (4, 4));
    }

    #[test]
    fn test_embedded_only_mimetype() {
        let s = sample(Some(format!("data:image/png;base64,{}", png_base64())), None);
        let resolved = check_sample_image(&s, &accepted()).unwrap();
        assert_eq!(resolved.mime_type, "image/png");
    }

    #[test]
    fn test_invalid_base64() {
        let s = sample(Some("this is not a b64".into()), Some("image/png"));
        assert_eq!(
            check_sample_image(&s, &accepted()).unwrap_err(),
            ValidationError::InvalidSampleData
        );
    }

    #[test]
    fn test_base64_but_not_an_image() {
        let s = sample(Some(STANDARD.encode("some information")), Some("image/png"));
        assert_eq!(
            check_sample_image(&s, &accepted()).unwrap_err(),
            ValidationError::InvalidSampleData
        );
    }

    #[test]
    fn test_missing_data_with_mimetype() {
        let s = sample(None, Some("image/png"));
        assert_eq!(
            check_sample_image(&s, &accepted()).unwrap_err(),
            ValidationError::InvalidSampleData
        );
    }
}
