//! Image generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::ImageProvider;
pub use types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImagePayload,
    ImageProviderKind, ImageSettings, DEFAULT_NEGATIVE_PROMPT,
};
