//! Core types for image generation.

use crate::error::{Result, StudioError};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Image backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// Google Gemini multimodal image models.
    #[default]
    Gemini,
    /// Stability AI diffusion endpoints.
    Stability,
}

impl ImageProviderKind {
    /// Parses a backend name as used in configuration and on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "stability" | "stability-ai" | "sdxl" => Some(Self::Stability),
            _ => None,
        }
    }

    /// Environment variable(s) consulted for this backend's API key, in order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            Self::Stability => &["STABILITY_API_KEY"],
        }
    }
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Stability => write!(f, "stability"),
        }
    }
}

/// Numeric generation parameters, echoed into every history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Diffusion steps.
    pub steps: u32,
    /// Seed; 0 lets the backend pick one.
    pub seed: u64,
    /// Classifier-free guidance scale.
    pub cfg_scale: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            steps: 40,
            seed: 0,
            cfg_scale: 5,
        }
    }
}

impl ImageSettings {
    /// Returns the seed if one was pinned.
    pub fn fixed_seed(&self) -> Option<u64> {
        (self.seed != 0).then_some(self.seed)
    }
}

/// Negative prompt used when the user does not supply one.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, bad, low quality";

/// A request to generate an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// What the image should avoid. Empty means none.
    pub negative_prompt: String,
    /// Numeric parameters.
    pub settings: ImageSettings,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt and default settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            settings: ImageSettings::default(),
        }
    }

    /// Sets the negative prompt.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = negative.into();
        self
    }

    /// Replaces all numeric settings.
    pub fn with_settings(mut self, settings: ImageSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the desired dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.settings.width = width;
        self.settings.height = height;
        self
    }

    /// Sets the seed for deterministic generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.settings.seed = seed;
        self
    }

    /// Returns the negative prompt if it carries any text.
    pub fn negative(&self) -> Option<&str> {
        let trimmed = self.negative_prompt.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model or engine used for generation.
    pub model: Option<String>,
    /// Seed reported by the backend.
    pub seed: Option<u64>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be stored or saved"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Backend that generated this image.
    pub provider: ImageProviderKind,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        provider: ImageProviderKind,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            data,
            format,
            provider,
            metadata,
        }
    }

    /// Decodes a base64 payload returned by a backend.
    pub fn from_base64(
        encoded: &str,
        format: ImageFormat,
        provider: ImageProviderKind,
        metadata: GenerationMetadata,
    ) -> Result<Self> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| StudioError::Decode(e.to_string()))?;
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or(format);
        Ok(Self::new(data, format, provider, metadata))
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL, the form kept in history.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            self.to_base64()
        )
    }
}

/// An image payload as stored in a history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// A decoded `data:` URL.
    Inline {
        /// Format derived from the MIME type or the bytes.
        format: ImageFormat,
        /// Raw image bytes.
        data: Vec<u8>,
    },
    /// Anything else, kept verbatim (usually a remote URL).
    Reference(String),
}

impl ImagePayload {
    /// Interprets a stored payload string.
    ///
    /// `data:<mime>;base64,<data>` decodes to [`ImagePayload::Inline`]; any other
    /// string, including a data URL that fails to decode, is a reference.
    pub fn parse(payload: &str) -> Self {
        Self::parse_data_url(payload).unwrap_or_else(|| Self::Reference(payload.to_string()))
    }

    fn parse_data_url(payload: &str) -> Option<Self> {
        let rest = payload.strip_prefix("data:")?;
        let (header, encoded) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        if !mime.starts_with("image/") {
            return None;
        }

        let cleaned: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let data = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned))
            .ok()?;

        let format = ImageFormat::from_magic_bytes(&data)
            .or_else(|| ImageFormat::from_mime_type(mime))
            .unwrap_or_default();
        Some(Self::Inline { format, data })
    }

    /// Returns true for decoded inline payloads.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }
}
