use crate::model::EncodedImage;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ImageCodecError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode image as JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// Converts rasters to the JPEG/base64 form the model expects.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    quality: u8,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(75)
    }
}

impl ImageCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decodes an uploaded file of any supported format.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageCodecError> {
        image::load_from_memory(bytes).map_err(ImageCodecError::Decode)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<DynamicImage, ImageCodecError> {
        image::open(path).map_err(ImageCodecError::Decode)
    }

    /// Drops alpha and palette information, compresses to JPEG and returns
    /// the bytes as base64 text. The source image is left untouched.
    pub fn encode(&self, image: &DynamicImage) -> Result<EncodedImage, ImageCodecError> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode_image(&rgb)
            .map_err(ImageCodecError::Encode)?;
        debug!(
            "Encoded {}x{} image into {} JPEG bytes",
            rgb.width(),
            rgb.height(),
            buffer.len()
        );
        Ok(EncodedImage::jpeg(BASE64.encode(&buffer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn translucent_gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 20) as u8, (y * 30) as u8, 128, ((x + y) * 10) as u8])
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn encoded_image_decodes_back_to_a_jpeg_of_the_same_size() {
        let source = translucent_gradient(7, 5);
        let encoded = ImageCodec::default().encode(&source).unwrap();

        assert_eq!(encoded.mime_type, "image/jpeg");
        let bytes = BASE64.decode(&encoded.data).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 5));
        assert!(decoded.color().channel_count() == 3 || decoded.color().channel_count() == 1);
    }

    #[test]
    fn encoding_is_ascii_and_deterministic() {
        let source = translucent_gradient(16, 16);
        let codec = ImageCodec::new(90);

        let first = codec.encode(&source).unwrap();
        let second = codec.encode(&source).unwrap();

        assert!(first.data.is_ascii());
        assert_eq!(first, second);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(ImageCodec::new(0).quality(), 1);
        assert_eq!(ImageCodec::new(255).quality(), 100);
        assert_eq!(ImageCodec::default().quality(), 75);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = ImageCodec::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageCodecError::Decode(_)));
    }

    #[test]
    fn decode_accepts_png_uploads() {
        let mut png = Vec::new();
        translucent_gradient(3, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let decoded = ImageCodec::decode(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 4));
    }
}
