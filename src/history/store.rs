//! Bounded, persisted generation history.

use crate::error::{Result, StudioError};
use crate::history::record::{next_id, GenerationRecord};
use crate::history::storage::KeyValueStore;
use crate::notice::Notice;

/// Storage key holding the serialized history list.
pub const HISTORY_KEY: &str = "genstudio_history";

/// Size bounds for a [`HistoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Maximum number of records kept.
    pub capacity: usize,
    /// Maximum serialized size in bytes before the store is halved.
    pub byte_budget: usize,
    /// Records kept when the backend rejects a write for quota.
    pub emergency_keep: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            capacity: 10,
            byte_budget: 4 * 1024 * 1024,
            emergency_keep: 5,
        }
    }
}

/// What `persist` ended up writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The full history was written.
    Written,
    /// The history exceeded the byte budget and was halved before writing.
    Optimized { kept: usize },
    /// The backend was over quota; only the most recent records were kept.
    Degraded { kept: usize },
    /// Even the reduced history did not fit; everything was dropped.
    Cleared,
}

impl PersistOutcome {
    /// The notice to show for this outcome, if any.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Written => None,
            Self::Optimized { kept } => Some(Notice::info(
                "Storage Optimized",
                format!("History reduced to {kept} items to prevent storage overflow"),
            )),
            Self::Degraded { .. } => Some(Notice::destructive(
                "Storage Full",
                "History automatically reduced to prevent app crashes",
            )),
            Self::Cleared => Some(Notice::destructive(
                "Storage Cleared",
                "History cleared due to storage limitations",
            )),
        }
    }
}

/// One rung of the fallback chain walked when the backend is over quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degradation {
    KeepRecent(usize),
    Clear,
}

/// Most-recent-first list of generation records, written through to a
/// [`KeyValueStore`] after every mutation.
pub struct HistoryStore {
    records: Vec<GenerationRecord>,
    storage: Box<dyn KeyValueStore>,
    limits: HistoryLimits,
}

impl HistoryStore {
    /// Creates a store over `storage` and loads whatever it holds.
    pub fn open(storage: Box<dyn KeyValueStore>, limits: HistoryLimits) -> Self {
        let mut store = Self {
            records: Vec::new(),
            storage,
            limits,
        };
        store.load();
        store
    }

    /// Replaces the in-memory list with the persisted one.
    ///
    /// Unreadable or unparsable data leaves the store empty; the failure is
    /// only logged. Returns the number of records loaded.
    pub fn load(&mut self) -> usize {
        self.records.clear();

        let raw = match self.storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read history");
                return 0;
            }
        };

        match serde_json::from_str::<Vec<GenerationRecord>>(&raw) {
            Ok(records) => {
                for record in records {
                    if self.records.len() == self.limits.capacity {
                        break;
                    }
                    if !self.records.iter().any(|r| r.id == record.id) {
                        self.records.push(record);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to parse history, starting empty"),
        }
        self.records.len()
    }

    /// Records, most recent first.
    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The configured bounds.
    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &str) -> Option<&GenerationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Id for a record created at `now_ms`, unique within this store.
    pub fn next_id(&self, now_ms: i64) -> String {
        let newest = self
            .records
            .iter()
            .filter_map(|r| r.id.parse::<i64>().ok())
            .max()
            .map(|id| id.to_string());
        next_id(newest.as_deref(), now_ms)
    }

    /// Records whose prompt contains `query`, ignoring case. An empty query
    /// matches everything.
    pub fn filter(&self, query: &str) -> Vec<&GenerationRecord> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.prompt_contains(&needle))
            .collect()
    }

    /// Prepends `record`, drops the oldest beyond capacity, and persists.
    ///
    /// A record with the same id already in the store is replaced.
    pub fn append(&mut self, record: GenerationRecord) -> Result<PersistOutcome> {
        self.records.retain(|r| r.id != record.id);
        self.records.insert(0, record);
        self.records.truncate(self.limits.capacity);
        self.persist()
    }

    /// Removes the record with `id` and persists. Returns `None` (and writes
    /// nothing) when no such record exists.
    pub fn remove(&mut self, id: &str) -> Result<Option<PersistOutcome>> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Ok(None);
        }
        self.persist().map(Some)
    }

    /// Empties the store and deletes the persisted entry.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.storage.remove(HISTORY_KEY)
    }

    /// Writes the whole list to storage.
    ///
    /// Over the byte budget, the list is first cut to half the capacity. If the
    /// backend then rejects the write for quota, the degradation ladder runs:
    /// keep the most recent `emergency_keep` records, then clear everything.
    /// Each rung runs only if the previous write hit the quota; any other
    /// storage error is returned as is.
    pub fn persist(&mut self) -> Result<PersistOutcome> {
        let mut outcome = PersistOutcome::Written;
        let mut payload = serde_json::to_string(&self.records)?;

        if payload.len() > self.limits.byte_budget {
            self.records.truncate(self.limits.capacity / 2);
            payload = serde_json::to_string(&self.records)?;
            tracing::warn!(
                kept = self.records.len(),
                budget = self.limits.byte_budget,
                "history over size budget, reduced"
            );
            outcome = PersistOutcome::Optimized {
                kept: self.records.len(),
            };
        }

        match self.storage.set(HISTORY_KEY, &payload) {
            Ok(()) => Ok(outcome),
            Err(e) if e.is_quota() => {
                tracing::warn!(error = %e, "history write over quota, degrading");
                self.degrade(e)
            }
            Err(e) => Err(e),
        }
    }

    fn ladder(&self) -> [Degradation; 2] {
        [
            Degradation::KeepRecent(self.limits.emergency_keep),
            Degradation::Clear,
        ]
    }

    fn degrade(&mut self, mut last_error: StudioError) -> Result<PersistOutcome> {
        for step in self.ladder() {
            match self.apply(step) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_quota() => {
                    tracing::warn!(?step, error = %e, "still over quota");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    fn apply(&mut self, step: Degradation) -> Result<PersistOutcome> {
        match step {
            Degradation::KeepRecent(keep) => {
                let keep = keep.min(self.records.len());
                let payload = serde_json::to_string(&self.records[..keep])?;
                self.storage.set(HISTORY_KEY, &payload)?;
                self.records.truncate(keep);
                Ok(PersistOutcome::Degraded { kept: keep })
            }
            Degradation::Clear => {
                self.storage.remove(HISTORY_KEY)?;
                self.records.clear();
                Ok(PersistOutcome::Cleared)
            }
        }
    }

    /// The backing storage.
    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    /// The backing storage, for preferences that live next to the history.
    pub fn storage_mut(&mut self) -> &mut dyn KeyValueStore {
        self.storage.as_mut()
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("records", &self.records.len())
            .field("limits", &self.limits)
            .finish()
    }
}
