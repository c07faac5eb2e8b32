//! Raster validation for image attachments.
//!
//! Corrupt payloads are rejected with a typed error before any model call
//! sees them.

use crate::error::MediaError;
use image::ImageReader;
use std::io::Cursor;

/// Verify the bytes decode as a raster image; returns `(width, height)`.
pub(crate) fn validate_image(data: &[u8]) -> Result<(u32, u32), MediaError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| MediaError::Decode(format!("image format detection failed: {e}")))?;

    if reader.format().is_none() {
        return Err(MediaError::Decode("not a recognized image format".to_string()));
    }

    reader
        .into_dimensions()
        .map_err(|e| MediaError::Decode(format!("image does not decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid 1x1 PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9C, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_valid_png_passes() {
        let (w, h) = validate_image(TINY_PNG).unwrap();
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = validate_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }

    #[test]
    fn test_truncated_header_rejected() {
        let err = validate_image(&TINY_PNG[..10]).unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }
}
