//! Image decode collaborator
//!
//! Turns encoded bytes (JPEG, PNG, ...) into an 8-bit RGB raster.
//! Grayscale, palette and alpha inputs are converted, not rejected.

use image::RgbImage;
use std::path::Path;

use crate::error::DecodeError;

/// Decode image bytes into an RGB raster
pub fn decode(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Read an image file from disk without blocking the runtime
pub async fn read_image_bytes(path: &Path) -> Result<Vec<u8>, DecodeError> {
    Ok(tokio::fs::read(path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(decode(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = decode(b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::Image(_))));
    }

    #[test]
    fn test_grayscale_is_converted() {
        let gray = GrayImage::from_pixel(4, 3, Luma([90]));
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let rgb = decode(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(0, 0).0, [90, 90, 90]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = read_image_bytes(Path::new("/nonexistent/path.jpg")).await;
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
