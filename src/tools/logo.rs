//! Logo creator

use serde::{Deserialize, Serialize};

use crate::adjust::{LayoutVariant, OverlayMode, Palette, StyleDefaults};
use crate::provider::{AspectRatio, GeneratedImage, GenerationProvider, ImageRequest, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoStyle {
    #[default]
    Simple,
    Minimalist,
    Colorful,
    Dark,
    Mascot,
}

impl LogoStyle {
    pub const ALL: [LogoStyle; 5] = [
        LogoStyle::Simple,
        LogoStyle::Minimalist,
        LogoStyle::Colorful,
        LogoStyle::Dark,
        LogoStyle::Mascot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogoStyle::Simple => "Simple",
            LogoStyle::Minimalist => "Minimalist",
            LogoStyle::Colorful => "Colorful",
            LogoStyle::Dark => "Dark",
            LogoStyle::Mascot => "Mascot",
        }
    }

    fn direction(&self) -> &'static str {
        match self {
            LogoStyle::Simple => "simple, professional vector logo",
            LogoStyle::Minimalist => "minimalist flat vector mark with modern typography",
            LogoStyle::Colorful => "vibrant pop-art logo with bold colors",
            LogoStyle::Dark => "luxury gold on black logo",
            LogoStyle::Mascot => "friendly mascot character illustration",
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
pub struct LogoRequest {
    pub brand_name: String,
    pub niche: String,
    pub style: LogoStyle,
}

impl LogoRequest {
    pub fn is_ready(&self) -> bool {
        !self.brand_name.trim().is_empty()
    }
}

pub fn logo_prompt(request: &LogoRequest) -> String {
    let background = if request.style == LogoStyle::Dark {
        "dark background"
    } else {
        "plain white background"
    };
    format!(
        "Design a professional logo. Business: {}. Niche: {}. Style: {} ({}). Use a {}.",
        request.brand_name.trim(),
        request.niche.trim(),
        request.style.name(),
        request.style.direction(),
        background
    )
}

pub async fn generate_logo(
    provider: &dyn GenerationProvider,
    request: &LogoRequest,
) -> Result<GeneratedImage, ProviderError> {
    let prompt = logo_prompt(request);
    provider
        .generate_image(ImageRequest::new(&prompt).aspect(AspectRatio::Square))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OfflineProvider;

    #[test]
    fn test_dark_logo_prompt() {
        let request = LogoRequest {
            brand_name: " Burger Bros ".into(),
            niche: "burgers".into(),
            style: LogoStyle::Dark,
        };
        let prompt = logo_prompt(&request);
        assert!(prompt.contains("Business: Burger Bros."));
        assert!(prompt.contains("dark background"));
    }

    #[tokio::test]
    async fn test_offline_logo_is_square() {
        let request = LogoRequest {
            brand_name: "Cafe".into(),
            ..LogoRequest::default()
        };
        let logo = generate_logo(&OfflineProvider::new(), &request).await.unwrap();
        let (w, h) = logo.dimensions();
        assert_eq!(w, h);
    }
}
