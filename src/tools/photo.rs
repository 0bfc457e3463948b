//! Photo studio
//!
//! Re-shoots a user's dish photo in one of the advertising styles.

use serde::{Deserialize, Serialize};

use crate::adjust::{LayoutVariant, OverlayMode, Palette, StyleDefaults};
use crate::provider::{GeneratedImage, GenerationProvider, ImageRequest, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhotoStyle {
    #[default]
    ProfessionalStudio,
    RusticWood,
    VibrantAdvertising,
    DarkMoody,
    MorningLight,
}

impl PhotoStyle {
    pub const ALL: [PhotoStyle; 5] = [
        PhotoStyle::ProfessionalStudio,
        PhotoStyle::RusticWood,
        PhotoStyle::VibrantAdvertising,
        PhotoStyle::DarkMoody,
        PhotoStyle::MorningLight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PhotoStyle::ProfessionalStudio => "Professional Studio",
            PhotoStyle::RusticWood => "Rustic Wood Table",
            PhotoStyle::VibrantAdvertising => "Vibrant Advertising",
            PhotoStyle::DarkMoody => "Dark & Moody",
            PhotoStyle::MorningLight => "Morning Light",
        }
    }

    fn direction(&self) -> &'static str {
        match self {
            PhotoStyle::ProfessionalStudio => {
                "fine-dining studio shot, soft studio light, neutral surface, sharp macro detail"
            }
            PhotoStyle::RusticWood => {
                "dark aged wooden table, window daylight, warm earthy tones, scattered fresh ingredients"
            }
            PhotoStyle::VibrantAdvertising => {
                "pop commercial look, saturated colors, hard light, glossy food on a bold solid background"
            }
            PhotoStyle::DarkMoody => "low key light, deep shadows, dark slate background, visible steam and texture",
            PhotoStyle::MorningLight => "bright airy breakfast scene, high key light, white linen, pastel tones",
        }
    }

    pub fn defaults(&self) -> StyleDefaults {
        StyleDefaults {
            layout: LayoutVariant::default(),
            overlay: OverlayMode::Neutral,
            palette: Palette::default(),
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhotoRequest {
    pub source: Option<GeneratedImage>,
    pub style: PhotoStyle,
}

pub fn photo_prompt(style: PhotoStyle) -> String {
    format!(
        "Turn this food photo into a world-class advertisement.\n\
         Target style: {}.\n\
         Keep the dish recognisable but make it look more appetising.\n\
         Replace the background to match the style and grade the light and color to fit.\n\
         The result must be photo-realistic.",
        style.direction()
    )
}

pub async fn enhance_photo(
    provider: &dyn GenerationProvider,
    request: &PhotoRequest,
) -> Result<GeneratedImage, ProviderError> {
    let source = request
        .source
        .as_ref()
        .ok_or_else(|| ProviderError::NotConfigured("load a photo first".to_string()))?;
    let prompt = photo_prompt(request.style);
    provider
        .generate_image(ImageRequest::new(&prompt).source(source))
        .await
}
