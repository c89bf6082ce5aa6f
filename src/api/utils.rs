//! API utility functions
//!
//! Pure, stateless helpers for HTTP request processing, extracted from
//! services.rs for unit testing.

use crate::api::error::ApiError;

/// Media types the pipeline accepts. Anything else is filtered out
/// before an item is ever queued, so unsupported files never enter the
/// dispatch state machine.
const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "video/mp4",
    "video/quicktime",
];

/// Parses the Content-Type header and checks it against the supported
/// media types.
///
/// Accepts parameters (`image/jpeg; some=thing`); rejects anything not
/// in the supported list, malformed media types included.
pub fn parse_media_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type)))?;

    let essence = media_type.essence_str().to_string();
    if !SUPPORTED_MEDIA_TYPES.contains(&essence.as_str()) {
        return Err(ApiError::UnsupportedMediaType(essence));
    }

    Ok(media_type)
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_media_types_accepted() {
        assert!(parse_media_type("image/jpeg").is_ok());
        assert!(parse_media_type("image/png").is_ok());
        assert!(parse_media_type("video/mp4").is_ok());
        assert!(parse_media_type("image/jpeg; charset=binary").is_ok());
    }

    #[test]
    fn unsupported_media_types_rejected() {
        assert!(matches!(
            parse_media_type("application/pdf"),
            Err(ApiError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            parse_media_type("text/plain"),
            Err(ApiError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            parse_media_type("image/tiff"),
            Err(ApiError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn malformed_media_types_rejected() {
        assert!(parse_media_type("").is_err());
        assert!(parse_media_type("not a mime").is_err());
    }

    #[test]
    fn body_size_within_limit() {
        let data = vec![0u8; 1000];
        assert!(validate_body_size(&data, 1000).is_ok());
        assert!(validate_body_size(&[], 100).is_ok());
    }

    #[test]
    fn body_size_over_limit() {
        let data = vec![0u8; 1000];
        match validate_body_size(&data, 999) {
            Err(ApiError::PayloadTooLarge(size)) => assert_eq!(size, 1000),
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }
}
