//! Image payload decoding: base64 (optionally data-URL prefixed) → RGB image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("image payload is empty")]
    Empty,
    #[error("invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("undecodable image: {0}")]
    Image(#[from] image::ImageError),
}

/// Strip an optional data-URL prefix (`data:image/png;base64,`).
///
/// Everything up to and including the first comma is discarded.
pub fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    }
}

/// Decode a base64 image payload into raw encoded image bytes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, PayloadError> {
    let data = strip_data_url(payload).trim();
    if data.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(STANDARD.decode(data)?)
}

/// Decode encoded image bytes (JPEG, PNG, ...) into an 8-bit RGB image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PayloadError> {
    if bytes.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Decode a base64 payload straight to an RGB image.
pub fn decode_payload(payload: &str) -> Result<RgbImage, PayloadError> {
    decode_image(&decode_base64(payload)?)
}
