//! Generation history: records, the bounded store, and its storage backends.

mod record;
mod storage;
mod store;

pub use record::GenerationRecord;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{HistoryLimits, HistoryStore, PersistOutcome, HISTORY_KEY};
