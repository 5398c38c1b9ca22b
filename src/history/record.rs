//! A single stored generation result.

use crate::image::{GenerationRequest, ImageSettings};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One generation kept in history: image payload, prompts, settings and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    /// Epoch-millis string, unique and increasing within a store.
    pub id: String,
    /// `data:` URL of the image, or a reference URL.
    #[serde(alias = "url")]
    pub image_data: String,
    /// Prompt the image was generated from.
    pub prompt: String,
    /// Negative prompt sent alongside.
    #[serde(default)]
    pub negative_prompt: String,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    /// Settings snapshot used for the generation.
    #[serde(default)]
    pub settings: ImageSettings,
}

impl GenerationRecord {
    /// Builds a record for a completed request.
    pub fn new(
        id: impl Into<String>,
        image_data: impl Into<String>,
        request: &GenerationRequest,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            image_data: image_data.into(),
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            timestamp,
            settings: request.settings,
        }
    }

    /// Returns the request that would regenerate this record.
    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest::new(self.prompt.clone())
            .with_negative_prompt(self.negative_prompt.clone())
            .with_settings(self.settings)
    }

    /// Case-insensitive substring match on the prompt. `needle` must already be lowercase.
    pub(crate) fn prompt_contains(&self, needle: &str) -> bool {
        needle.is_empty() || self.prompt.to_lowercase().contains(needle)
    }

    /// Creation time, if the timestamp is representable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// Picks the id for a record created at `now_ms`.
///
/// Ids are epoch-millis strings; if the newest existing id is not older than
/// `now_ms` the new id is one past it, so ids stay unique and increasing.
pub(crate) fn next_id(newest: Option<&str>, now_ms: i64) -> String {
    let floor = newest
        .and_then(|id| id.parse::<i64>().ok())
        .map(|id| id.saturating_add(1))
        .unwrap_or(i64::MIN);
    now_ms.max(floor).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let req = GenerationRequest::new("A red fox").with_negative_prompt("blurry");
        let record = GenerationRecord::new("1700000000000", "data:image/png;base64,AA==", &req, 1_700_000_000_000);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["imageData"], "data:image/png;base64,AA==");
        assert_eq!(json["negativePrompt"], "blurry");
        assert_eq!(json["settings"]["cfgScale"], 5);
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_accepts_legacy_url_key() {
        let json = r#"{
            "id": "1",
            "url": "data:image/png;base64,AA==",
            "prompt": "old entry",
            "negativePrompt": "",
            "timestamp": 1,
            "settings": {"width": 512, "height": 512, "steps": 30, "seed": 0, "cfgScale": 7}
        }"#;
        let record: GenerationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.image_data, "data:image/png;base64,AA==");
        assert_eq!(record.settings.width, 512);
        assert_eq!(record.settings.cfg_scale, 7);
    }

    #[test]
    fn test_prompt_contains_is_case_insensitive() {
        let record = GenerationRecord::new("1", "", &GenerationRequest::new("Sunset over Lisbon"), 1);
        assert!(record.prompt_contains("lisbon"));
        assert!(record.prompt_contains(""));
        assert!(!record.prompt_contains("porto"));
    }

    #[test]
    fn test_next_id() {
        assert_eq!(next_id(None, 1_000), "1000");
        assert_eq!(next_id(Some("900"), 1_000), "1000");
        assert_eq!(next_id(Some("1000"), 1_000), "1001");
        assert_eq!(next_id(Some("1005"), 1_000), "1006");
        assert_eq!(next_id(Some("not-a-number"), 1_000), "1000");
    }

    #[test]
    fn test_to_request_restores_settings() {
        let req = GenerationRequest::new("A castle")
            .with_negative_prompt("fog")
            .with_seed(77);
        let record = GenerationRecord::new("5", "", &req, 5);
        assert_eq!(record.to_request(), req);
        assert!(record.created_at().is_some());
    }
}
