//! Social media calendar

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::provider::{clean_json_array, GenerationProvider, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub day: String,
    pub topic: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl SocialPost {
    /// Caption and hashtags as one clipboard-ready block.
    pub fn to_clipboard(&self) -> String {
        if self.hashtags.is_empty() {
            return self.caption.clone();
        }
        let tags: Vec<String> = self
            .hashtags
            .iter()
            .map(|t| {
                if t.starts_with('#') {
                    t.clone()
                } else {
                    format!("#{}", t)
                }
            })
            .collect();
        format!("{}\n\n{}", self.caption, tags.join(" "))
    }
}

pub fn calendar_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "day": { "type": "STRING" },
                "topic": { "type": "STRING" },
                "caption": { "type": "STRING" },
                "hashtags": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["day", "topic", "caption", "hashtags"]
        }
    })
}

pub fn calendar_prompt(niche: &str) -> String {
    format!(
        "Create a 7-day social media content calendar for a business in the niche \"{}\".\n\
         For each day from Monday to Sunday give a topic, an engaging caption and relevant hashtags.\n\
         Mix educational, promotional, engagement and lifestyle posts.",
        niche.trim()
    )
}

/// Parse a calendar from raw model text, tolerating fences and prose.
pub fn parse_calendar(raw: &str) -> Result<Vec<SocialPost>, ProviderError> {
    serde_json::from_str(&clean_json_array(raw)).map_err(|e| ProviderError::Malformed(e.to_string()))
}

pub async fn generate_calendar(
    provider: &dyn GenerationProvider,
    niche: &str,
) -> Result<Vec<SocialPost>, ProviderError> {
    let value = provider
        .generate_structured(&calendar_prompt(niche), &calendar_schema())
        .await?;
    let posts = match value {
        // some responses arrive as a JSON string holding the array
        Value::String(raw) => parse_calendar(&raw)?,
        other => serde_json::from_value(other).map_err(|e| ProviderError::Malformed(e.to_string()))?,
    };
    if posts.is_empty() {
        return Err(ProviderError::Malformed("calendar is empty".to_string()));
    }
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_calendar() {
        let raw = "```json\n[{\"day\":\"Monday\",\"topic\":\"Launch\",\"caption\":\"New menu!\",\"hashtags\":[\"food\"]}]\n```";
        let posts = parse_calendar(raw).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].day, "Monday");
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(parse_calendar("no json here"), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_clipboard_adds_hash() {
        let post = SocialPost {
            day: "Monday".into(),
            topic: "t".into(),
            caption: "Try it".into(),
            hashtags: vec!["pizza".into(), "#food".into()],
        };
        assert_eq!(post.to_clipboard(), "Try it\n\n#pizza #food");
    }
}
