//! Brand identity creator
//!
//! Produces slogans, mission, vision, values and ready-to-use phrases from a
//! short brand brief.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::provider::{GenerationProvider, ProviderError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandRequest {
    pub brand_name: String,
    pub industry: String,
    pub description: String,
    /// Sample sentences in the voice the brand already uses.
    pub tone_examples: String,
}

impl BrandRequest {
    pub fn is_ready(&self) -> bool {
        !self.brand_name.trim().is_empty() && !self.industry.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandIdentity {
    #[serde(default)]
    pub slogans: Vec<String>,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub tone_of_voice: String,
    #[serde(default)]
    pub packaging_phrases: Vec<String>,
    #[serde(default)]
    pub social_media_phrases: Vec<String>,
}

impl BrandIdentity {
    pub fn is_empty(&self) -> bool {
        self.slogans.is_empty() && self.mission.trim().is_empty() && self.values.is_empty()
    }

    /// Titled sections with their entries, in display order.
    pub fn sections(&self) -> Vec<(&'static str, Vec<String>)> {
        let single = |text: &str| {
            if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![text.trim().to_string()]
            }
        };
        vec![
            ("Slogans", self.slogans.clone()),
            ("Mission", single(&self.mission)),
            ("Vision", single(&self.vision)),
            ("Values", self.values.clone()),
            ("Tone of voice", single(&self.tone_of_voice)),
            ("Packaging", self.packaging_phrases.clone()),
            ("Social media", self.social_media_phrases.clone()),
        ]
    }

    /// Plain text brand book for the clipboard.
    pub fn to_clipboard(&self) -> String {
        self.sections()
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(title, entries)| {
                let body: Vec<String> = entries.iter().map(|e| format!("- {}", e)).collect();
                format!("{}\n{}", title, body.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub fn identity_schema() -> Value {
    let list = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
    json!({
        "type": "OBJECT",
        "properties": {
            "slogans": list,
            "mission": { "type": "STRING" },
            "vision": { "type": "STRING" },
            "values": list,
            "toneOfVoice": { "type": "STRING" },
            "packagingPhrases": list,
            "socialMediaPhrases": list
        },
        "required": ["slogans", "mission", "vision", "values", "toneOfVoice", "packagingPhrases", "socialMediaPhrases"]
    })
}

pub fn identity_prompt(request: &BrandRequest) -> String {
    format!(
        "Act as a senior brand strategist and create a complete brand identity.\n\
         Brand: {}\n\
         Industry: {}\n\
         Description: {}\n\
         Tone examples: {}\n\
         Give five slogans, a mission, a vision, core values, a description of the tone of voice, \
         phrases for packaging and phrases for social media.",
        request.brand_name.trim(),
        request.industry.trim(),
        request.description.trim(),
        request.tone_examples.trim()
    )
}

/// Parse an identity from raw model text, tolerating fences and prose.
pub fn parse_identity(raw: &str) -> Result<BrandIdentity, ProviderError> {
    let clean = raw.replace("```json", "").replace("```", "");
    let clean = match (clean.find('{'), clean.rfind('}')) {
        (Some(start), Some(end)) if start < end => &clean[start..=end],
        _ => clean.trim(),
    };
    serde_json::from_str(clean).map_err(|e| ProviderError::Malformed(e.to_string()))
}

pub async fn generate_identity(
    provider: &dyn GenerationProvider,
    request: &BrandRequest,
) -> Result<BrandIdentity, ProviderError> {
    let value = provider
        .generate_structured(&identity_prompt(request), &identity_schema())
        .await?;
    let identity = match value {
        Value::String(raw) => parse_identity(&raw)?,
        other => serde_json::from_value(other).map_err(|e| ProviderError::Malformed(e.to_string()))?,
    };
    if identity.is_empty() {
        return Err(ProviderError::Malformed("brand identity is empty".to_string()));
    }
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OfflineProvider;

    #[test]
    fn test_parse_fenced_identity() {
        let raw = "Sure!\n```json\n{\"slogans\":[\"Taste the sun\"],\"mission\":\"Feed joy\",\"toneOfVoice\":\"Warm\"}\n```";
        let identity = parse_identity(raw).unwrap();
        assert_eq!(identity.slogans, vec!["Taste the sun"]);
        assert_eq!(identity.tone_of_voice, "Warm");
        assert!(identity.values.is_empty());
    }

    #[test]
    fn test_clipboard_skips_empty_sections() {
        let identity = BrandIdentity {
            slogans: vec!["Fresh daily".into()],
            mission: "Bake good bread".into(),
            ..BrandIdentity::default()
        };
        assert_eq!(
            identity.to_clipboard(),
            "Slogans\n- Fresh daily\n\nMission\n- Bake good bread"
        );
    }

    #[test]
    fn test_request_needs_name_and_industry() {
        let mut request = BrandRequest {
            brand_name: "Sol".into(),
            ..BrandRequest::default()
        };
        assert!(!request.is_ready());
        request.industry = "Bakery".into();
        assert!(request.is_ready());
    }

    #[tokio::test]
    async fn test_offline_identity_is_not_configured() {
        let request = BrandRequest {
            brand_name: "Sol".into(),
            industry: "Bakery".into(),
            ..BrandRequest::default()
        };
        let err = generate_identity(&OfflineProvider::new(), &request).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
