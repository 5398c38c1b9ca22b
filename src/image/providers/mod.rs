//! Image generation providers.

#[cfg(feature = "gemini-image")]
mod gemini;
#[cfg(feature = "stability-image")]
mod stability;

#[cfg(feature = "gemini-image")]
pub use gemini::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

#[cfg(feature = "stability-image")]
pub use stability::{StabilityEngine, StabilityProvider, StabilityProviderBuilder};
