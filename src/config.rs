//! Studio configuration: backend selection, data directory and storage bounds.
//!
//! Values come from the builder methods, falling back to environment variables:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `GENSTUDIO_BACKEND` | `gemini` or `stability` | `gemini` |
//! | `GENSTUDIO_MODEL` | model / engine id for the backend | backend default |
//! | `GENSTUDIO_DATA_DIR` | where history and preferences live | platform data dir |
//! | `GENSTUDIO_STORAGE_QUOTA` | storage quota in bytes, `0` for none | 5 MiB |
//!
//! API keys are resolved by the provider builders (`GOOGLE_API_KEY` /
//! `GEMINI_API_KEY`, `STABILITY_API_KEY`).

use crate::error::{Result, StudioError};
use crate::history::{FileStore, HistoryLimits};
use crate::image::{ImageProvider, ImageProviderKind};
use std::path::PathBuf;

/// Default storage quota, in line with browser local storage.
pub const DEFAULT_STORAGE_QUOTA: u64 = 5 * 1024 * 1024;

const DATA_DIR_FALLBACK: &str = ".genstudio";

/// Resolved studio configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    /// Which image backend to use.
    pub backend: ImageProviderKind,
    /// Model or engine id override for the backend.
    pub model: Option<String>,
    /// Directory holding persisted state.
    pub data_dir: PathBuf,
    /// Storage quota in bytes; `None` for unbounded.
    pub storage_quota: Option<u64>,
    /// History bounds.
    pub limits: HistoryLimits,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            backend: ImageProviderKind::default(),
            model: None,
            data_dir: default_data_dir(),
            storage_quota: Some(DEFAULT_STORAGE_QUOTA),
            limits: HistoryLimits::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "genstudio")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_FALLBACK))
}

impl StudioConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = lookup("GENSTUDIO_BACKEND") {
            config.backend = ImageProviderKind::from_name(&backend).ok_or_else(|| {
                StudioError::InvalidRequest(format!(
                    "unknown backend {backend:?} (expected gemini or stability)"
                ))
            })?;
        }
        if let Some(model) = lookup("GENSTUDIO_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = Some(model.trim().to_string());
        }
        if let Some(dir) = lookup("GENSTUDIO_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(quota) = lookup("GENSTUDIO_STORAGE_QUOTA") {
            let bytes: u64 = quota.trim().parse().map_err(|_| {
                StudioError::InvalidRequest(format!(
                    "GENSTUDIO_STORAGE_QUOTA must be a byte count, got {quota:?}"
                ))
            })?;
            config.storage_quota = (bytes > 0).then_some(bytes);
        }

        Ok(config)
    }

    /// Sets the backend.
    pub fn with_backend(mut self, backend: ImageProviderKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the model or engine id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the storage quota.
    pub fn with_storage_quota(mut self, quota: Option<u64>) -> Self {
        self.storage_quota = quota;
        self
    }

    /// Sets the history bounds.
    pub fn with_limits(mut self, limits: HistoryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Opens the file-backed storage in the data directory.
    pub fn open_storage(&self) -> Result<FileStore> {
        FileStore::open(&self.data_dir, self.storage_quota)
    }

    /// Builds the configured image backend.
    pub fn build_provider(&self) -> Result<Box<dyn ImageProvider>> {
        match self.backend {
            ImageProviderKind::Gemini => {
                #[cfg(feature = "gemini-image")]
                {
                    use crate::image::providers::{GeminiModel, GeminiProvider};

                    let mut builder = GeminiProvider::builder();
                    if let Some(ref id) = self.model {
                        let model = GeminiModel::from_id(id).ok_or_else(|| {
                            StudioError::InvalidRequest(format!("unknown Gemini model {id:?}"))
                        })?;
                        builder = builder.model(model);
                    }
                    Ok(Box::new(builder.build()?))
                }
                #[cfg(not(feature = "gemini-image"))]
                {
                    Err(StudioError::ProviderNotAvailable(
                        "gemini (enable the gemini-image feature)".into(),
                    ))
                }
            }
            ImageProviderKind::Stability => {
                #[cfg(feature = "stability-image")]
                {
                    use crate::image::providers::{StabilityEngine, StabilityProvider};

                    let mut builder = StabilityProvider::builder();
                    if let Some(ref id) = self.model {
                        let engine = StabilityEngine::from_id(id).ok_or_else(|| {
                            StudioError::InvalidRequest(format!("unknown Stability engine {id:?}"))
                        })?;
                        builder = builder.engine(engine);
                    }
                    Ok(Box::new(builder.build()?))
                }
                #[cfg(not(feature = "stability-image"))]
                {
                    Err(StudioError::ProviderNotAvailable(
                        "stability (enable the stability-image feature)".into(),
                    ))
                }
            }
        }
    }
}
