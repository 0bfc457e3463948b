//! Promotion text generator

use crate::provider::{GenerationProvider, ProviderError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionRequest {
    pub product: String,
    pub occasion: String,
    pub offer: String,
    pub rules: String,
}

pub fn promotion_prompt(request: &PromotionRequest) -> String {
    format!(
        "Write a short, persuasive promotion message for WhatsApp or Instagram.\n\
         Product: {}\n\
         Occasion: {}\n\
         Offer: {}\n\
         Rules: {}\n\
         Use emojis, clear line breaks and a sense of urgency.\n\
         Use a single asterisk for bold (like *Offer*), never two.\n\
         End with a call to action.",
        request.product, request.occasion, request.offer, request.rules
    )
}

/// Messaging apps bold with one asterisk.
pub fn normalize_bold(text: &str) -> String {
    text.replace("**", "*")
}

pub async fn generate_promotion(
    provider: &dyn GenerationProvider,
    request: &PromotionRequest,
) -> Result<String, ProviderError> {
    let text = provider.generate_text(&promotion_prompt(request)).await?;
    Ok(normalize_bold(text.trim()))
}
