use super::Normalizer;
use crate::error::Result;
use crate::identity::FileIdentity;
use image::DynamicImage;

/// Decodes images with the `image` crate and keeps the pixel buffer, prefixed
/// with the image's width, height and colour type.
///
/// The container format is sniffed from the content, so a mislabelled PNG
/// saved as `.jpg` still decodes.
pub struct PixelNormalizer;

impl PixelNormalizer {
    fn layout_prefix(image: &DynamicImage) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(16);
        prefix.extend_from_slice(&image.width().to_be_bytes());
        prefix.extend_from_slice(&image.height().to_be_bytes());
        prefix.extend_from_slice(format!("{:?};", image.color()).as_bytes());
        prefix
    }
}

impl Normalizer for PixelNormalizer {
    /// Names the byte layout and the decoder release line. Bump it whenever
    /// the layout changes or the `image` dependency moves to a new minor
    /// version, since decoders may produce different pixels across releases.
    fn id(&self) -> &'static str {
        "pixels-v2+image-0.24"
    }

    fn normalize(&self, _identity: &FileIdentity, data: &[u8]) -> Result<Vec<u8>> {
        let image = image::load_from_memory(data)?;
        let mut normalized = Self::layout_prefix(&image);
        normalized.extend_from_slice(image.as_bytes());
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 30) as u8, (y * 60) as u8, 128])
        })
    }

    fn png(img: &RgbImage) -> Vec<u8> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn test_png_pixels() {
        let img = gradient(8, 4);
        let identity = FileIdentity::new("g.png");
        let normalized = PixelNormalizer.normalize(&identity, &png(&img)).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&8u32.to_be_bytes());
        expected.extend_from_slice(&4u32.to_be_bytes());
        expected.extend_from_slice(b"Rgb8;");
        expected.extend_from_slice(&img.into_raw());
        assert_eq!(normalized, expected);
    }

    #[test]
    fn test_same_buffer_different_shape_differs() {
        let wide = gradient(8, 4);
        let tall = RgbImage::from_raw(4, 8, wide.as_raw().clone()).unwrap();
        assert_eq!(wide.as_raw(), tall.as_raw());

        let identity = FileIdentity::new("g.png");
        let wide_bytes = PixelNormalizer.normalize(&identity, &png(&wide)).unwrap();
        let tall_bytes = PixelNormalizer.normalize(&identity, &png(&tall)).unwrap();
        assert_ne!(wide_bytes, tall_bytes);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let identity = FileIdentity::new("g.jpg");
        assert!(PixelNormalizer.normalize(&identity, b"hello").is_err());
    }
}
