//! User-facing notices.
//!
//! Every state-changing studio operation reports its outcome as one short
//! title + description notice, delivered through a [`Notifier`].

use crate::error::StudioError;
use serde::Serialize;
use std::sync::Mutex;

/// How prominently a notice should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeVariant {
    /// Informational.
    #[default]
    Default,
    /// Something failed or data was lost.
    Destructive,
}

/// A short title + description notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Headline, e.g. "Storage Full".
    pub title: String,
    /// One-sentence detail.
    pub description: String,
    /// Display variant.
    pub variant: NoticeVariant,
}

impl Notice {
    /// Creates an informational notice.
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Default,
        }
    }

    /// Creates a destructive notice.
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }

    /// Converts an operation failure into its notice.
    pub fn from_error(err: &StudioError) -> Self {
        match err {
            StudioError::ShareUnsupported => Self::info(
                "Share Not Supported",
                "This platform does not support native sharing. Download the image instead.",
            ),
            StudioError::Share(_) => Self::destructive("Error", "Failed to share image."),
            other => Self::destructive("Error", other.to_string()),
        }
    }

    /// Returns true for destructive notices.
    pub fn is_destructive(&self) -> bool {
        self.variant == NoticeVariant::Destructive
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Receives notices.
pub trait Notifier: Send + Sync {
    /// Delivers one notice.
    fn notify(&self, notice: &Notice);
}

impl<F> Notifier for F
where
    F: Fn(&Notice) + Send + Sync,
{
    fn notify(&self, notice: &Notice) {
        self(notice)
    }
}

/// Writes notices to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.variant {
            NoticeVariant::Default => {
                tracing::info!(title = %notice.title, "{}", notice.description)
            }
            NoticeVariant::Destructive => {
                tracing::warn!(title = %notice.title, "{}", notice.description)
            }
        }
    }
}

/// Collects notices in memory until taken.
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything collected so far.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Returns a copy of everything collected so far.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error() {
        let notice = Notice::from_error(&StudioError::Validation("Please enter a prompt first".into()));
        assert_eq!(notice.title, "Error");
        assert_eq!(notice.description, "Please enter a prompt first");
        assert!(notice.is_destructive());

        let notice = Notice::from_error(&StudioError::ShareUnsupported);
        assert_eq!(notice.title, "Share Not Supported");
        assert!(!notice.is_destructive());

        let notice = Notice::from_error(&StudioError::Share("permission denied".into()));
        assert_eq!(notice.description, "Failed to share image.");
    }

    #[test]
    fn test_notice_log_take_drains() {
        let log = NoticeLog::new();
        log.notify(&Notice::info("Deleted", "Image removed from history"));
        assert_eq!(log.snapshot().len(), 1);
        assert_eq!(log.take().len(), 1);
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_closure_notifier() {
        let seen = Mutex::new(Vec::new());
        let notifier = |n: &Notice| seen.lock().unwrap().push(n.title.clone());
        notifier.notify(&Notice::info("Success", "Image generated successfully!"));
        assert_eq!(seen.into_inner().unwrap(), vec!["Success".to_string()]);
    }

    #[test]
    fn test_serialize_variant_lowercase() {
        let json = serde_json::to_value(Notice::destructive("Storage Cleared", "x")).unwrap();
        assert_eq!(json["variant"], "destructive");
    }
}
