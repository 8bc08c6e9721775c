//! Image encoding: [`SourceImage`] → base64 payload ready for the request body.
//!
//! Vision APIs accept images as base64 data embedded in the JSON body, with a
//! hard limit on the encoded size. Phone photos routinely exceed that limit,
//! so images whose longest edge is above the configured cap are downscaled
//! first (aspect ratio kept, original format kept). Images already within
//! the cap are sent byte-for-byte.

use super::input::{ImageFormat, SourceImage};
use crate::error::NotesError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use std::io::Cursor;
use tracing::{debug, info};

/// An image ready to be embedded in a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) of the encoded image.
    pub data: String,
    pub format: ImageFormat,
    /// Dimensions of the image actually sent.
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// `data:<mime>;base64,<payload>` as used by OpenAI-compatible APIs.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.data)
    }
}

/// Prepare `image` for upload.
///
/// # Errors
/// * [`NotesError::UnsupportedImage`] — the image needed resizing but could
///   not be decoded or re-encoded
/// * [`NotesError::ImageTooLarge`] — the base64 payload is above
///   `max_encoded_bytes`
pub fn encode_image(
    image: &SourceImage,
    max_dimension: u32,
    max_encoded_bytes: usize,
) -> Result<EncodedImage, NotesError> {
    let longest = image.width().max(image.height());

    let (bytes, width, height) = if longest > max_dimension {
        let (buf, w, h) = downscale(image, max_dimension)?;
        info!(
            "Downscaled {} from {}x{} to {}x{}",
            image.name(),
            image.width(),
            image.height(),
            w,
            h
        );
        (buf, w, h)
    } else {
        (image.bytes().to_vec(), image.width(), image.height())
    };

    let data = STANDARD.encode(&bytes);
    debug!("Encoded image → {} bytes base64", data.len());

    if data.len() > max_encoded_bytes {
        return Err(NotesError::ImageTooLarge {
            name: image.name().to_string(),
            bytes: data.len(),
            limit: max_encoded_bytes,
        });
    }

    Ok(EncodedImage {
        data,
        format: image.format(),
        width,
        height,
    })
}

/// Decode, resize to fit `max_dimension` × `max_dimension`, re-encode.
fn downscale(image: &SourceImage, max_dimension: u32) -> Result<(Vec<u8>, u32, u32), NotesError> {
    let format = image.format().to_image_format();
    let decoded = image::load_from_memory_with_format(image.bytes(), format).map_err(|e| {
        NotesError::UnsupportedImage {
            name: image.name().to_string(),
            detail: format!("decode failed: {e}"),
        }
    })?;

    let resized = decoded.resize(max_dimension, max_dimension, FilterType::Lanczos3);

    let mut buf = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| NotesError::UnsupportedImage {
            name: image.name().to_string(),
            detail: format!("re-encode failed: {e}"),
        })?;

    Ok((buf, resized.width(), resized.height()))
}
