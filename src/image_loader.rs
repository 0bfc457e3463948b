//! Image loading utilities
//!
//! Decoding of source photos and provider payloads, plus the data URL form
//! used to store images inside menu design files.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

/// Load an image from bytes
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image from memory")?;
    Ok(img)
}

/// Read a source photo from disk, returning its bytes and MIME type.
pub fn read_source_image(path: &Path) -> Result<(Vec<u8>, String)> {
    if !is_supported_format(path) {
        bail!("Unsupported image format: {:?}", path);
    }
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    Ok((bytes, mime_for_path(path).to_string()))
}

/// Get supported image format extensions
pub fn supported_extensions() -> &'static [&'static str] {
    &["png", "jpg", "jpeg", "gif", "webp"]
}

/// Check if a file extension is a supported image format
pub fn is_supported_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            supported_extensions().iter().any(|&e| e == ext_lower)
        })
        .unwrap_or(false)
}

/// MIME type derived from the file extension; JPEG when unknown.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buf.into_inner())
}

/// Encode as baseline JPEG. Alpha is dropped, so composite first.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("Failed to encode JPEG")?;
    Ok(buf)
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a `data:<mime>;base64,<payload>` URL.
///
/// A bare base64 payload is accepted and treated as JPEG.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let url = url.trim();
    let (mime, payload) = match url.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest.split_once(',').context("Data URL has no payload")?;
            let mime = meta
                .strip_suffix(";base64")
                .context("Only base64 data URLs are supported")?;
            (mime.to_string(), payload)
        }
        None => ("image/jpeg".to_string(), url),
    };
    let bytes = STANDARD.decode(payload).context("Invalid base64 payload")?;
    Ok((mime, bytes))
}
