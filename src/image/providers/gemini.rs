//! Gemini (Google) image generation provider.

use crate::error::{parse_retry_after, sanitize_error_message, Result, StudioError};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    FlashImage,
    /// Gemini 2.0 Flash image-generation preview.
    FlashPreview,
    /// Gemini 3 Pro Image (highest quality).
    ProImage,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::FlashPreview => "gemini-2.0-flash-preview-image-generation",
            Self::ProImage => "gemini-3-pro-image-preview",
        }
    }

    /// Parses a model identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::FlashImage, Self::FlashPreview, Self::ProImage]
            .into_iter()
            .find(|m| m.as_str() == id)
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .or_else(|| {
                ImageProviderKind::Gemini
                    .api_key_env_vars()
                    .iter()
                    .find_map(|var| std::env::var(var).ok())
            })
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                StudioError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        Ok(GeminiProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::from_generation_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        tracing::debug!(model = self.model.as_str(), "Gemini generation complete");

        let mut image = gemini_response.into_image()?;
        image.metadata = GenerationMetadata {
            model: Some(self.model.as_str().to_string()),
            seed: request.settings.fixed_seed(),
            duration_ms: Some(start.elapsed().as_millis() as u64),
        };
        Ok(image)
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> StudioError {
    let text = sanitize_error_message(text);
    if status == 404 {
        return StudioError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return StudioError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return StudioError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
        return StudioError::ContentBlocked(text);
    }
    StudioError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_impl(request).await
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Gemini
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        // The model takes no negative prompt field; it rides along in the text.
        let text = match req.negative() {
            Some(negative) => format!("{}\n\nAvoid: {}", req.prompt, negative),
            None => req.prompt.clone(),
        };

        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiRequestPart { text }],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                seed: req.settings.fixed_seed(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

impl GeminiResponse {
    /// Maps the response to the first inline image it carries.
    fn into_image(self) -> Result<GeneratedImage> {
        // Blocks come back as HTTP 200 with prompt feedback.
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(StudioError::ContentBlocked(msg));
            }
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            StudioError::ResponseFormat("Invalid response format from AI service".into())
        })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST" => {
                    return Err(StudioError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                _ => {}
            }
        }

        let parts = candidate
            .content
            .map(|c| c.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| {
                StudioError::ResponseFormat("Invalid response format from AI service".into())
            })?;

        let inline_data = parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| {
                StudioError::ResponseFormat(
                    "API did not return an image. Check prompts or API limits.".into(),
                )
            })?;

        let format = inline_data
            .mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
            .unwrap_or(ImageFormat::Png);

        GeneratedImage::from_base64(
            &inline_data.data,
            format,
            ImageProviderKind::Gemini,
            GenerationMetadata::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::FlashImage.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::FlashPreview.as_str(),
            "gemini-2.0-flash-preview-image-generation"
        );
        assert_eq!(
            GeminiModel::from_id("gemini-3-pro-image-preview"),
            Some(GeminiModel::ProImage)
        );
        assert_eq!(GeminiModel::from_id("imagen"), None);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::FlashPreview)
            .build()
            .unwrap();
        assert_eq!(provider.model(), GeminiModel::FlashPreview);
        assert_eq!(provider.kind(), ImageProviderKind::Gemini);
        assert_eq!(provider.name(), "Gemini (Google)");
    }

    #[test]
    fn test_request_construction_basic() {
        let req = GenerationRequest::new("A puppy");
        let gemini_req = GeminiRequest::from_generation_request(&req);

        assert_eq!(gemini_req.contents.len(), 1);
        assert_eq!(gemini_req.contents[0].parts.len(), 1);
        assert_eq!(gemini_req.contents[0].parts[0].text, "A puppy");
        assert_eq!(
            gemini_req.generation_config.response_modalities,
            vec!["TEXT", "IMAGE"]
        );
        assert!(gemini_req.generation_config.seed.is_none());
    }

    #[test]
    fn test_request_construction_with_negative_and_seed() {
        let req = GenerationRequest::new("A puppy")
            .with_negative_prompt("blurry")
            .with_seed(42);
        let gemini_req = GeminiRequest::from_generation_request(&req);

        assert_eq!(gemini_req.generation_config.seed, Some(42));
        assert_eq!(
            gemini_req.contents[0].parts[0].text,
            "A puppy\n\nAvoid: blurry"
        );
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let req = GenerationRequest::new("A puppy").with_seed(1);
        let gemini_req = GeminiRequest::from_generation_request(&req);
        let json = serde_json::to_value(&gemini_req).unwrap();

        assert!(json.get("generationConfig").is_some());
        assert!(json.get("generation_config").is_none());
        assert_eq!(
            json["generationConfig"]["responseModalities"][1],
            serde_json::json!("IMAGE")
        );
    }

    #[test]
    fn test_response_maps_first_inline_image() {
        // 12 bytes of PNG signature + padding
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your image"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgoAAAAA"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let image = resp.into_image().unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.provider, ImageProviderKind::Gemini);
        assert_eq!(image.size(), 12);
    }

    #[test]
    fn test_response_without_image_is_format_error() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "I cannot draw that"}]}
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_image().unwrap_err();
        assert!(matches!(err, StudioError::ResponseFormat(_)));
        assert_eq!(
            err.to_string(),
            "API did not return an image. Check prompts or API limits."
        );
    }

    #[test]
    fn test_response_without_candidates_is_format_error() {
        let resp: GeminiResponse = serde_json::from_str("{}").unwrap();
        let err = resp.into_image().unwrap_err();
        assert_eq!(err.to_string(), "Invalid response format from AI service");
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_image().unwrap_err();
        assert!(matches!(err, StudioError::ContentBlocked(ref m) if m == "Prompt was blocked due to safety"));
    }

    #[test]
    fn test_response_safety_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_image(),
            Err(StudioError::ContentBlocked(_))
        ));
    }

    #[test]
    fn test_parse_error_status_mapping() {
        let headers = reqwest::header::HeaderMap::new();
        assert!(matches!(
            parse_error(401, "nope", &headers),
            StudioError::Auth(_)
        ));
        assert!(matches!(
            parse_error(429, "", &headers),
            StudioError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            parse_error(500, r#"{"error": {"message": "internal"}}"#, &headers),
            StudioError::Api { status: 500, ref message } if message == "internal"
        ));
    }
}
