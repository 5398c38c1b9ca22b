#![warn(missing_docs)]
//! genstudio - prompt-to-image generation with a local history.
//!
//! A [`Studio`] sends one prompt at a time to an image backend (Gemini or
//! Stability AI), keeps the results in a small bounded history persisted to a
//! key/value store, and reports every outcome as a short [`Notice`].
//!
//! # Quick Start
//!
//! ```no_run
//! use genstudio::{ImageSettings, NoticeLog, Studio, StudioConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let config = StudioConfig::from_env()?;
//!     let notices = Arc::new(NoticeLog::new());
//!     let mut studio = Studio::from_config(&config, notices.clone())?;
//!
//!     let record = studio
//!         .generate("A golden retriever puppy", "blurry", ImageSettings::default())
//!         .await?;
//!     println!("stored {} ({} in history)", record.id, studio.history().len());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini (Google)
//! - `stability-image`: Stability AI
//! - `image`: both backends
//! - `cli`: the `genstudio` command-line front end

mod error;

pub mod config;
pub mod export;
pub mod history;
pub mod image;
pub mod notice;
pub mod studio;

pub use error::{Result, StudioError};

pub use config::StudioConfig;
pub use export::{download_image, share_image, Download, NoShare, ShareTarget, SharedImage};
pub use history::{
    FileStore, GenerationRecord, HistoryLimits, HistoryStore, KeyValueStore, MemoryStore,
    PersistOutcome,
};
pub use image::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImagePayload,
    ImageProvider, ImageProviderKind, ImageSettings,
};
pub use notice::{Notice, NoticeLog, NoticeVariant, Notifier, TracingNotifier};
pub use studio::{AppState, Studio, Theme};

#[cfg(feature = "gemini-image")]
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

#[cfg(feature = "stability-image")]
pub use image::providers::{StabilityEngine, StabilityProvider, StabilityProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, StudioError};
    pub use crate::history::{GenerationRecord, HistoryStore};
    pub use crate::image::{GenerationRequest, ImageProvider, ImageSettings};
    pub use crate::notice::{Notice, Notifier};
    pub use crate::studio::Studio;

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;

    #[cfg(feature = "stability-image")]
    pub use crate::image::providers::StabilityProvider;
}
