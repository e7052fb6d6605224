//! Image preprocessing module
//!
//! Normalizes an uploaded image before it is sent to the vision model:
//! - Decoding (declared MIME type as a hint, content sniffing as fallback)
//! - RGB conversion
//! - Proportional resize to a fixed width
//! - JPEG re-encoding and base64 encoding

use base64::{engine::general_purpose, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Width every image is resized to before upload
pub const TARGET_WIDTH: u32 = 800;

/// Tallest output accepted, as a multiple of `TARGET_WIDTH`
pub const MAX_ASPECT_RATIO: u32 = 8;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("image is too tall to analyze ({width}x{height})")]
    TooTall { width: u32, height: u32 },

    #[error("failed to encode image as JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// An image ready to be embedded in a multimodal prompt
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Base64 (standard alphabet) of the JPEG bytes
    pub base64: String,
    pub width: u32,
    pub height: u32,
    /// Size of the encoded JPEG in bytes
    pub encoded_len: usize,
}

/// Decode raw upload bytes
pub fn decode_image(bytes: &[u8], mime_type: &str) -> Result<DynamicImage, PreprocessError> {
    if let Some(format) = ImageFormat::from_mime_type(mime_type) {
        if let Ok(img) = image::load_from_memory_with_format(bytes, format) {
            return Ok(img);
        }
    }

    // Declared type missing or wrong: let the decoder sniff the content
    image::load_from_memory(bytes).map_err(PreprocessError::Decode)
}

/// Dimensions after scaling to `TARGET_WIDTH`, height truncated, never zero.
///
/// Fails when the scaled height would exceed `MAX_ASPECT_RATIO * TARGET_WIDTH`.
pub fn target_dimensions(width: u32, height: u32) -> Result<(u32, u32), PreprocessError> {
    let scaled = (u64::from(TARGET_WIDTH) * u64::from(height)) / u64::from(width.max(1));
    let max_height = u64::from(TARGET_WIDTH * MAX_ASPECT_RATIO);
    if scaled > max_height {
        return Err(PreprocessError::TooTall { width, height });
    }
    let new_height =
        u32::try_from(scaled.max(1)).map_err(|_| PreprocessError::TooTall { width, height })?;
    Ok((TARGET_WIDTH, new_height))
}

/// Convert to RGB and resize to `TARGET_WIDTH` with Lanczos resampling
pub fn normalize_image(input: &DynamicImage) -> Result<RgbImage, PreprocessError> {
    let (width, height) = (input.width(), input.height());
    if width == 0 || height == 0 {
        return Err(PreprocessError::Empty { width, height });
    }

    let (new_width, new_height) = target_dimensions(width, height)?;
    let rgb = input.to_rgb8();

    Ok(image::imageops::resize(
        &rgb,
        new_width,
        new_height,
        FilterType::Lanczos3,
    ))
}

/// Encode an RGB image as JPEG in memory
pub fn encode_jpeg(input: &RgbImage) -> Result<Vec<u8>, PreprocessError> {
    let mut jpeg_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg_bytes);
    input
        .write_to(&mut cursor, ImageFormat::Jpeg)
        .map_err(PreprocessError::Encode)?;
    Ok(jpeg_bytes)
}

/// Run the whole normalization chain on an upload
pub fn prepare_image(bytes: &[u8], mime_type: &str) -> Result<PreparedImage, PreprocessError> {
    let decoded = decode_image(bytes, mime_type)?;
    let normalized = normalize_image(&decoded)?;
    let jpeg = encode_jpeg(&normalized)?;

    Ok(PreparedImage {
        base64: general_purpose::STANDARD.encode(&jpeg),
        width: normalized.width(),
        height: normalized.height(),
        encoded_len: jpeg.len(),
    })
}
