//! Generation providers
//!
//! The generative backend is reached through [`GenerationProvider`]. The HTTP
//! implementation talks to the Gemini REST API; the offline implementation
//! produces deterministic local output.

pub mod gemini;
pub mod offline;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::Value;
use thiserror::Error;

use crate::image_loader;

pub use gemini::GeminiProvider;
pub use offline::OfflineProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("generation provider is not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("no image was generated")]
    NoImage,
    #[error("failed to decode generated image: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Request(e.to_string())
    }
}

/// An image returned by the provider, kept both encoded and decoded.
#[derive(Clone)]
pub struct GeneratedImage {
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
    pub image: Arc<DynamicImage>,
}

impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .field("size", &(self.image.width(), self.image.height()))
            .finish()
    }
}

impl GeneratedImage {
    /// Decode `bytes` and keep the encoded form alongside.
    pub fn from_bytes(bytes: Vec<u8>, mime: impl Into<String>) -> Result<Self, ProviderError> {
        let image = image_loader::load_image_from_bytes(&bytes).map_err(|e| ProviderError::Decode(format!("{:#}", e)))?;
        Ok(Self {
            mime: mime.into(),
            bytes: Arc::new(bytes),
            image: Arc::new(image),
        })
    }

    /// Encode an in-memory bitmap as PNG.
    pub fn from_image(image: DynamicImage) -> Result<Self, ProviderError> {
        let bytes = image_loader::encode_png(&image).map_err(|e| ProviderError::Decode(format!("{:#}", e)))?;
        Ok(Self {
            mime: "image/png".to_string(),
            bytes: Arc::new(bytes),
            image: Arc::new(image),
        })
    }

    pub fn from_data_url(url: &str) -> Result<Self, ProviderError> {
        let (mime, bytes) = image_loader::decode_data_url(url).map_err(|e| ProviderError::Decode(format!("{:#}", e)))?;
        Self::from_bytes(bytes, mime)
    }

    pub fn to_data_url(&self) -> String {
        image_loader::encode_data_url(&self.mime, &self.bytes)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Requested aspect ratio for image generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
        }
    }
}

/// One image generation call
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest<'a> {
    pub prompt: &'a str,
    pub aspect: Option<AspectRatio>,
    pub source: Option<&'a GeneratedImage>,
}

impl<'a> ImageRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            aspect: None,
            source: None,
        }
    }

    pub fn aspect(mut self, aspect: AspectRatio) -> Self {
        self.aspect = Some(aspect);
        self
    }

    pub fn source(mut self, source: &'a GeneratedImage) -> Self {
        self.source = Some(source);
        self
    }
}

/// Generative backend used by every tool
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Ask for JSON matching `schema`.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value, ProviderError>;

    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;

    async fn generate_image(&self, request: ImageRequest<'_>) -> Result<GeneratedImage, ProviderError>;
}

/// Strip markdown code fences and keep the outermost JSON array.
///
/// Returns the trimmed input when no brackets are present.
pub fn clean_json_array(raw: &str) -> String {
    let clean = raw.replace("```json", "").replace("```", "");
    let clean = clean.trim();
    match (clean.find('['), clean.rfind(']')) {
        (Some(start), Some(end)) if start < end => clean[start..=end].to_string(),
        _ => clean.to_string(),
    }
}
