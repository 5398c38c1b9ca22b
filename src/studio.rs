//! The generation controller and the application state it owns.

use crate::config::StudioConfig;
use crate::error::{Result, StudioError};
use crate::export::{download_image, share_image, Download, NoShare, ShareTarget};
use crate::history::{
    GenerationRecord, HistoryLimits, HistoryStore, KeyValueStore, PersistOutcome,
};
use crate::image::{GenerationRequest, ImageProvider, ImageSettings, DEFAULT_NEGATIVE_PROMPT};
use crate::notice::{Notice, Notifier};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Storage key holding the selected theme.
pub const THEME_KEY: &str = "theme";

/// Display theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark theme.
    #[default]
    Dark,
    /// Light theme.
    Light,
}

impl Theme {
    /// Returns the stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// Parses a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag raised while a generation is outstanding.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

impl InFlight {
    /// Returns true while a generation is outstanding.
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Raises the flag, or returns `None` if it is already raised.
    fn try_begin(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(&self.0)))
    }
}

/// Lowers the in-flight flag when dropped, including when the generation
/// future is dropped before it settles.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// UI-facing state owned by the [`Studio`].
#[derive(Debug, Clone)]
pub struct AppState {
    /// Selected theme.
    pub theme: Theme,
    /// Prompt being edited.
    pub prompt: String,
    /// Negative prompt being edited.
    pub negative_prompt: String,
    /// Settings being edited.
    pub settings: ImageSettings,
    /// Payload of the most recently generated image.
    pub current_image: Option<String>,
    /// Raised while a generation is outstanding.
    pub in_flight: InFlight,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            prompt: String::new(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            settings: ImageSettings::default(),
            current_image: None,
            in_flight: InFlight::default(),
        }
    }
}

/// Drives generations against one backend and keeps the history.
///
/// Every operation that changes state reports through the notifier; errors
/// are also returned so callers can react, but they have already been shown.
pub struct Studio {
    provider: Box<dyn ImageProvider>,
    history: HistoryStore,
    state: AppState,
    notifier: Arc<dyn Notifier>,
    share_target: Box<dyn ShareTarget>,
}

impl Studio {
    /// Creates a studio over `storage`, loading history and theme from it.
    pub fn new(
        provider: Box<dyn ImageProvider>,
        storage: Box<dyn KeyValueStore>,
        limits: HistoryLimits,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let history = HistoryStore::open(storage, limits);

        let theme = match history.storage().get(THEME_KEY) {
            Ok(value) => value.as_deref().and_then(Theme::from_name).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read theme");
                Theme::default()
            }
        };

        tracing::debug!(
            provider = provider.name(),
            records = history.len(),
            %theme,
            "studio opened"
        );

        Self {
            provider,
            history,
            state: AppState {
                theme,
                ..AppState::default()
            },
            notifier,
            share_target: Box::new(NoShare),
        }
    }

    /// Builds the backend and file storage described by `config`.
    pub fn from_config(config: &StudioConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let provider = config.build_provider()?;
        let storage = config.open_storage()?;
        Ok(Self::new(provider, Box::new(storage), config.limits, notifier))
    }

    /// Replaces the platform share facility.
    pub fn with_share_target(mut self, target: Box<dyn ShareTarget>) -> Self {
        self.share_target = target;
        self
    }

    /// Current application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The history store.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The active backend.
    pub fn provider(&self) -> &dyn ImageProvider {
        self.provider.as_ref()
    }

    /// Returns true while a generation is outstanding; the generate action
    /// should be disabled meanwhile.
    pub fn is_generating(&self) -> bool {
        self.state.in_flight.is_active()
    }

    /// Sets the prompt being edited.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.state.prompt = prompt.into();
    }

    /// Sets the negative prompt being edited.
    pub fn set_negative_prompt(&mut self, negative: impl Into<String>) {
        self.state.negative_prompt = negative.into();
    }

    /// Sets the settings being edited.
    pub fn set_settings(&mut self, settings: ImageSettings) {
        self.state.settings = settings;
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(&notice);
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            self.notify(Notice::from_error(e));
        }
        result
    }

    fn report_persist(&self, outcome: PersistOutcome) {
        if let Some(notice) = outcome.notice() {
            self.notify(notice);
        }
    }

    /// Generates from the prompt, negative prompt and settings in the state.
    pub async fn generate_current(&mut self) -> Result<GenerationRecord> {
        let prompt = self.state.prompt.clone();
        let negative = self.state.negative_prompt.clone();
        let settings = self.state.settings;
        self.generate(&prompt, &negative, settings).await
    }

    /// Generates one image and records it in history.
    ///
    /// An empty prompt fails with [`StudioError::Validation`] without any
    /// request. Exactly one request is issued otherwise; there is no retry.
    /// On success the new record is at position 0 of the history.
    pub async fn generate(
        &mut self,
        prompt: &str,
        negative_prompt: &str,
        settings: ImageSettings,
    ) -> Result<GenerationRecord> {
        let result = self.generate_inner(prompt, negative_prompt, settings).await;
        self.report(result)
    }

    async fn generate_inner(
        &mut self,
        prompt: &str,
        negative_prompt: &str,
        settings: ImageSettings,
    ) -> Result<GenerationRecord> {
        if prompt.trim().is_empty() {
            return Err(StudioError::Validation("Please enter a prompt first".into()));
        }

        let _guard = self.state.in_flight.try_begin().ok_or(StudioError::Busy)?;

        self.state.prompt = prompt.to_string();
        self.state.negative_prompt = negative_prompt.to_string();
        self.state.settings = settings;
        self.state.current_image = None;

        let request = GenerationRequest::new(prompt)
            .with_negative_prompt(negative_prompt)
            .with_settings(settings);

        tracing::debug!(provider = %self.provider.kind(), "submitting generation request");
        let image = self.provider.generate(&request).await?;
        tracing::debug!(
            bytes = image.size(),
            duration_ms = image.metadata.duration_ms,
            "generation complete"
        );

        let now = chrono::Utc::now().timestamp_millis();
        let record = GenerationRecord::new(
            self.history.next_id(now),
            image.to_data_url(),
            &request,
            now,
        );
        self.state.current_image = Some(record.image_data.clone());

        self.notify(Notice::info("Success", "Image generated successfully!"));
        match self.history.append(record.clone()) {
            Ok(outcome) => self.report_persist(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "failed to save history");
                self.notify(Notice::destructive(
                    "Error",
                    format!("Image generated but history could not be saved: {e}"),
                ));
            }
        }

        Ok(record)
    }

    /// Removes one record from history.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let result = match self.history.remove(id) {
            Ok(Some(outcome)) => {
                self.notify(Notice::info("Deleted", "Image removed from history"));
                self.report_persist(outcome);
                Ok(())
            }
            Ok(None) => Err(StudioError::NotFound(id.to_string())),
            Err(e) => Err(e),
        };
        self.report(result)
    }

    /// Removes every record from history.
    pub fn clear_history(&mut self) -> Result<()> {
        let result = self.history.clear();
        if result.is_ok() {
            self.notify(Notice::info(
                "History Cleared",
                "All images have been removed from history",
            ));
        }
        self.report(result)
    }

    /// Loads a record's prompt, negative prompt and settings into the state.
    pub fn restore(&mut self, id: &str) -> Result<GenerationRecord> {
        let result = self
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| StudioError::NotFound(id.to_string()));

        if let Ok(ref record) = result {
            self.state.prompt = record.prompt.clone();
            self.state.negative_prompt = record.negative_prompt.clone();
            self.state.settings = record.settings;
            self.notify(Notice::info(
                "Prompt Loaded",
                "Settings and prompts have been restored",
            ));
        }
        self.report(result)
    }

    /// Records whose prompt contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<&GenerationRecord> {
        self.history.filter(query)
    }

    /// Flips the theme and persists the choice.
    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.state.theme.toggled();
        self.state.theme = theme;
        let result = self
            .history
            .storage_mut()
            .set(THEME_KEY, theme.as_str())
            .map(|()| theme);
        self.report(result)
    }

    /// Prepares a download of a stored record's image.
    pub fn download(&self, id: &str) -> Result<Download> {
        let result = self
            .history
            .get(id)
            .map(|r| download_image(&r.image_data))
            .ok_or_else(|| StudioError::NotFound(id.to_string()));
        self.report(result)
    }

    /// Shares a stored record's image through the platform share facility.
    pub fn share(&self, id: &str) -> Result<()> {
        let result = self
            .history
            .get(id)
            .ok_or_else(|| StudioError::NotFound(id.to_string()))
            .and_then(|r| share_image(self.share_target.as_ref(), &r.image_data));

        match result {
            Ok(()) => {
                self.notify(Notice::info("Shared", "Image handed to the share sheet"));
                Ok(())
            }
            Err(e) => {
                if matches!(e, StudioError::Share(_)) {
                    tracing::warn!(error = %e, "share failed");
                }
                self.report(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("provider", &self.provider.kind())
            .field("history", &self.history)
            .field("state", &self.state)
            .finish()
    }
}
