//! Stability AI (diffusion) image generation provider.

use crate::error::{parse_retry_after, sanitize_error_message, Result, StudioError};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://api.stability.ai/v1";

/// Stability engine variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StabilityEngine {
    /// Stable Diffusion XL 1.0.
    #[default]
    SdxlV1,
    /// Stable Diffusion 1.6.
    SdV16,
}

impl StabilityEngine {
    /// Returns the API engine identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SdxlV1 => "stable-diffusion-xl-1024-v1-0",
            Self::SdV16 => "stable-diffusion-v1-6",
        }
    }

    /// Parses an engine identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::SdxlV1, Self::SdV16]
            .into_iter()
            .find(|e| e.as_str() == id)
    }
}

/// Builder for StabilityProvider.
#[derive(Debug, Clone, Default)]
pub struct StabilityProviderBuilder {
    api_key: Option<String>,
    engine: StabilityEngine,
    base_url: Option<String>,
}

impl StabilityProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `STABILITY_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the engine.
    pub fn engine(mut self, engine: StabilityEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<StabilityProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("STABILITY_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                StudioError::Auth("STABILITY_API_KEY not set and no API key provided".into())
            })?;

        Ok(StabilityProvider {
            client: reqwest::Client::new(),
            api_key,
            engine: self.engine,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

/// Stability AI text-to-image provider.
pub struct StabilityProvider {
    client: reqwest::Client,
    api_key: String,
    engine: StabilityEngine,
    base_url: String,
}

impl StabilityProvider {
    /// Creates a new `StabilityProviderBuilder`.
    pub fn builder() -> StabilityProviderBuilder {
        StabilityProviderBuilder::new()
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        validate_settings(request)?;
        let start = Instant::now();

        let url = format!(
            "{}/generation/{}/text-to-image",
            self.base_url,
            self.engine.as_str()
        );
        let body = StabilityRequest::from_generation_request(request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let stability_response: StabilityResponse = response.json().await?;
        tracing::debug!(
            engine = self.engine.as_str(),
            artifacts = stability_response.artifacts.len(),
            "Stability generation complete"
        );

        let mut image = stability_response.into_image()?;
        image.metadata.model = Some(self.engine.as_str().to_string());
        image.metadata.duration_ms = Some(start.elapsed().as_millis() as u64);
        Ok(image)
    }
}

fn validate_settings(request: &GenerationRequest) -> Result<()> {
    let s = &request.settings;
    if s.width % 64 != 0 || s.height % 64 != 0 {
        return Err(StudioError::InvalidRequest(format!(
            "width and height must be multiples of 64 (got {}x{})",
            s.width, s.height
        )));
    }
    if !(10..=50).contains(&s.steps) {
        return Err(StudioError::InvalidRequest(format!(
            "steps must be between 10 and 50 (got {})",
            s.steps
        )));
    }
    if s.cfg_scale > 35 {
        return Err(StudioError::InvalidRequest(format!(
            "cfg scale must be between 0 and 35 (got {})",
            s.cfg_scale
        )));
    }
    Ok(())
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> StudioError {
    let text = sanitize_error_message(text);
    match status {
        401 | 403 => StudioError::Auth(text),
        404 => StudioError::InvalidRequest(
            "Engine not found. Verify the engine id is correct.".into(),
        ),
        429 => StudioError::RateLimited {
            retry_after: parse_retry_after(headers).map(std::time::Duration::from_secs),
        },
        400 if text.to_lowercase().contains("invalid_prompts") => {
            StudioError::ContentBlocked(text)
        }
        400 => StudioError::InvalidRequest(text),
        _ => StudioError::Api {
            status,
            message: text,
        },
    }
}

#[async_trait]
impl ImageProvider for StabilityProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_impl(request).await
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Stability
    }
}

#[derive(Debug, Serialize)]
struct StabilityRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: u32,
    width: u32,
    height: u32,
    steps: u32,
    seed: u64,
    samples: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt {
    text: String,
    weight: f32,
}

impl StabilityRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        let mut text_prompts = vec![TextPrompt {
            text: req.prompt.clone(),
            weight: 1.0,
        }];
        if let Some(negative) = req.negative() {
            text_prompts.push(TextPrompt {
                text: negative.to_string(),
                weight: -1.0,
            });
        }

        let s = &req.settings;
        Self {
            text_prompts,
            cfg_scale: s.cfg_scale,
            width: s.width,
            height: s.height,
            steps: s.steps,
            seed: s.seed,
            samples: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StabilityResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl StabilityResponse {
    fn into_image(self) -> Result<GeneratedImage> {
        let artifact = self.artifacts.into_iter().next().ok_or_else(|| {
            StudioError::ResponseFormat(
                "API did not return an image. Check prompts or API limits.".into(),
            )
        })?;

        if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
            return Err(StudioError::ContentBlocked(
                "Image blocked by Stability content filter".into(),
            ));
        }

        let encoded = artifact.base64.filter(|b| !b.is_empty()).ok_or_else(|| {
            StudioError::ResponseFormat(
                "API did not return an image. Check prompts or API limits.".into(),
            )
        })?;

        GeneratedImage::from_base64(
            &encoded,
            ImageFormat::Png,
            ImageProviderKind::Stability,
            GenerationMetadata {
                model: None,
                seed: artifact.seed,
                duration_ms: None,
            },
        )
    }
}
