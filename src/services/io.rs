//! Byte-level image decode and encode
//!
//! The hosting web layer hands the core decoded request bytes and expects
//! encoded bytes back; this module owns both conversions so format handling
//! stays out of the business logic.

use crate::config::OutputFormat;
use crate::error::{PhotoNormError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};

/// Decode raw image bytes (JPEG, PNG, or WebP).
///
/// # Errors
///
/// Returns [`PhotoNormError::Decode`] for unreadable or invalid bytes.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| PhotoNormError::decode(e.to_string()))
}

/// Encode an image to the requested output format.
///
/// `quality` applies to JPEG only (0-100); PNG is lossless.
pub fn encode_image(image: &RgbImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.min(100));
            image
                .write_with_encoder(encoder)
                .map_err(|e| PhotoNormError::encode(e.to_string()))?;
        }
        OutputFormat::Png => {
            let mut cursor = std::io::Cursor::new(&mut buffer);
            image
                .write_to(&mut cursor, ImageFormat::Png)
                .map_err(|e| PhotoNormError::encode(e.to_string()))?;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ]);
        }
        img
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(matches!(err, PhotoNormError::Decode(_)));
    }

    #[test]
    fn encode_jpeg_magic_bytes() {
        let data = encode_image(&gradient_image(32, 32), OutputFormat::Jpeg, 90).unwrap();
        assert_eq!(data[0], 0xFF);
        assert_eq!(data[1], 0xD8);
    }

    #[test]
    fn encode_png_magic_bytes() {
        let data = encode_image(&gradient_image(32, 32), OutputFormat::Png, 0).unwrap();
        assert_eq!(&data[1..4], b"PNG");
    }

    #[test]
    fn jpeg_round_trip_preserves_dimensions() {
        // Lossy pixels are fine; dimensions must survive exactly.
        let original = gradient_image(123, 77);
        let encoded = encode_image(&original, OutputFormat::Jpeg, 80).unwrap();
        let decoded = decode_image(&encoded).unwrap();
        assert_eq!(decoded.width(), 123);
        assert_eq!(decoded.height(), 77);
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let original = gradient_image(48, 64);
        let encoded = encode_image(&original, OutputFormat::Png, 0).unwrap();
        let decoded = decode_image(&encoded).unwrap().to_rgb8();
        assert_eq!(decoded.as_raw(), original.as_raw());
    }
}
