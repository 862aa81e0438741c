//! Image coding at the model boundary.
//!
//! Drawings arrive from the extractor as JPEG, JPEG 2000 or PNG bytes. They
//! are decoded once into a `DynamicImage` (kept in the session for display)
//! and re-encoded as a base64 PNG for the multimodal request body.
//! `detail: "high"` keeps small dimension callouts legible to GPT-4-class
//! models, which otherwise downsample to a single 512 px tile.

use crate::error::InferenceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Decode the raw bytes of one extracted drawing.
pub fn decode_drawing(bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::load_from_memory(bytes).map_err(|e| InferenceError::UndecodableImage {
        detail: e.to_string(),
    })
}

/// Encode a drawing as a base64 PNG ready for the VLM API.
pub fn encode_drawing(img: &DynamicImage) -> Result<ImageData, InferenceError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| InferenceError::Encode {
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} drawing → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
