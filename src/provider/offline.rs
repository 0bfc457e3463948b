//! Offline provider
//!
//! Deterministic stand-in used by `--offline` runs. Images are painted
//! locally from a hash of the prompt; structured output is unavailable, so
//! tools that have a local fallback use it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde_json::Value;

use super::{AspectRatio, GeneratedImage, GenerationProvider, ImageRequest, ProviderError};
use crate::color_space::{interpolate_color, Rgb};

const BASE_SIZE: u32 = 512;

#[derive(Debug, Clone, Default)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }
}

fn seed(prompt: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    prompt.hash(&mut hasher);
    hasher.finish()
}

fn seeded_color(seed: u64, shift: u32) -> Rgb {
    let v = seed.rotate_left(shift);
    Rgb::new((v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8)
}

/// Vertical gradient with a soft disc, colors taken from the prompt hash.
pub fn paint_placeholder(prompt: &str, width: u32, height: u32) -> RgbaImage {
    let seed = seed(prompt);
    let top = seeded_color(seed, 0);
    let bottom = seeded_color(seed, 24);
    let mut img = RgbaImage::from_fn(width, height, |_, y| {
        let t = y as f32 / height.max(1) as f32;
        interpolate_color(top, bottom, t).with_alpha(255)
    });

    let accent = seeded_color(seed, 48);
    let radius = (width.min(height) / 4) as i32;
    draw_filled_circle_mut(
        &mut img,
        ((width / 2) as i32, (height / 2) as i32),
        radius,
        accent.with_alpha(255),
    );
    img
}

/// Warm tint over a source photo, standing in for an enhancement pass.
fn tint(source: &DynamicImage, prompt: &str) -> RgbaImage {
    let mut img = source.to_rgba8();
    if img.width() > 1024 || img.height() > 1024 {
        img = imageops::resize(&img, 1024, 1024, imageops::FilterType::Triangle);
    }
    let tone = seeded_color(seed(prompt), 8);
    for Rgba(px) in img.pixels_mut() {
        px[0] = ((px[0] as u16 * 3 + tone.r as u16) / 4) as u8;
        px[1] = ((px[1] as u16 * 3 + tone.g as u16) / 4) as u8;
        px[2] = ((px[2] as u16 * 3 + tone.b as u16) / 4) as u8;
    }
    img
}

#[async_trait]
impl GenerationProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate_structured(&self, _prompt: &str, _schema: &Value) -> Result<Value, ProviderError> {
        Err(ProviderError::NotConfigured(
            "structured generation needs an online provider".to_string(),
        ))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let lines: Vec<&str> = prompt
            .lines()
            .map(str::trim)
            .filter(|l| l.contains(':'))
            .collect();
        if lines.is_empty() {
            return Err(ProviderError::Malformed("nothing to draft from".to_string()));
        }
        Ok(format!("*Offline draft*\n{}", lines.join("\n")))
    }

    async fn generate_image(&self, request: ImageRequest<'_>) -> Result<GeneratedImage, ProviderError> {
        let img = match request.source {
            Some(source) => tint(&source.image, request.prompt),
            None => {
                let (w, h) = match request.aspect {
                    Some(AspectRatio::Portrait) => (BASE_SIZE * 3 / 4, BASE_SIZE),
                    _ => (BASE_SIZE, BASE_SIZE),
                };
                paint_placeholder(request.prompt, w, h)
            }
        };
        tracing::debug!(width = img.width(), height = img.height(), "painted offline image");
        GeneratedImage::from_image(DynamicImage::ImageRgba8(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = paint_placeholder("bella pizza", 32, 32);
        let b = paint_placeholder("bella pizza", 32, 32);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_portrait_aspect() {
        let provider = OfflineProvider::new();
        let image = provider
            .generate_image(ImageRequest::new("menu").aspect(AspectRatio::Portrait))
            .await
            .unwrap();
        assert_eq!(image.dimensions(), (384, 512));
    }

    #[tokio::test]
    async fn test_structured_unavailable() {
        let provider = OfflineProvider::new();
        let result = provider.generate_structured("x", &Value::Null).await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_source_image_keeps_size() {
        let provider = OfflineProvider::new();
        let source = GeneratedImage::from_image(DynamicImage::new_rgba8(20, 10)).unwrap();
        let out = provider
            .generate_image(ImageRequest::new("photo").source(&source))
            .await
            .unwrap();
        assert_eq!(out.dimensions(), (20, 10));
    }
}
