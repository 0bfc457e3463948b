//! Gemini REST client
//!
//! Calls `models/{model}:generateContent` with plain JSON bodies.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{GeneratedImage, GenerationProvider, ImageRequest, ProviderError};
use crate::config::{secret_from_env, ProviderConfig};

pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    text_model: String,
    image_model: String,
    fallback_image_model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter())
            .into_iter()
            .flatten()
    }

    fn text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }

    fn inline_image(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }
}

impl GeminiProvider {
    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = secret_from_env(&config.api_key_env)
            .ok_or_else(|| ProviderError::NotConfigured(format!("{} is not set", config.api_key_env)))?;
        Ok(Self::new(config, api_key))
    }

    pub fn new(config: &ProviderConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            fallback_image_model: config.fallback_image_model.clone(),
        }
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GenerateResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.endpoint, model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn image_with_model(&self, model: &str, body: &Value) -> Result<GeneratedImage, ProviderError> {
        let response = self.generate_content(model, body).await?;
        let inline = response.inline_image().ok_or(ProviderError::NoImage)?;
        let bytes = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        GeneratedImage::from_bytes(bytes, inline.mime_type.clone())
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn image_body(request: &ImageRequest<'_>) -> Value {
    let mut parts = Vec::new();
    if let Some(source) = request.source {
        parts.push(json!({
            "inlineData": { "mimeType": source.mime, "data": STANDARD.encode(source.bytes.as_slice()) }
        }));
    }
    parts.push(json!({ "text": request.prompt }));

    let mut body = json!({ "contents": [{ "parts": parts }] });
    if let Some(aspect) = request.aspect {
        body["generationConfig"] = json!({ "imageConfig": { "aspectRatio": aspect.as_str() } });
    }
    body
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value, ProviderError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }
        });
        let response = self.generate_content(&self.text_model, &body).await?;
        let text = response
            .text()
            .ok_or_else(|| ProviderError::Malformed("empty structured response".to_string()))?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self.generate_content(&self.text_model, &body).await?;
        response
            .text()
            .ok_or_else(|| ProviderError::Malformed("empty text response".to_string()))
    }

    async fn generate_image(&self, request: ImageRequest<'_>) -> Result<GeneratedImage, ProviderError> {
        let body = image_body(&request);
        match self.image_with_model(&self.image_model, &body).await {
            Ok(image) => Ok(image),
            Err(primary) => {
                tracing::warn!(
                    model = %self.image_model,
                    fallback = %self.fallback_image_model,
                    error = %primary,
                    "primary image model failed"
                );
                // the fallback model does not accept imageConfig
                let mut fallback_body = body;
                if let Some(obj) = fallback_body.as_object_mut() {
                    obj.remove("generationConfig");
                }
                self.image_with_model(&self.fallback_image_model, &fallback_body)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AspectRatio;

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"chef"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello chef"));
        assert!(response.inline_image().is_none());
    }

    #[test]
    fn test_response_inline_image() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"x"},{"inlineData":{"mimeType":"image/png","data":"AAAA"}}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        let inline = response.inline_image().unwrap();
        assert_eq!(inline.mime_type, "image/png");
    }

    #[test]
    fn test_empty_candidates() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":{"message":"quota"}}"#), "quota");
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn test_image_body_shape() {
        let request = ImageRequest::new("a logo").aspect(AspectRatio::Square);
        let body = image_body(&request);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "a logo");
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let config = ProviderConfig {
            api_key_env: "FOODCRAFT_TEST_UNSET_KEY".into(),
            ..ProviderConfig::default()
        };
        assert!(matches!(
            GeminiProvider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
