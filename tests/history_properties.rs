//! Property tests for the bounded history store.

use genstudio::history::{
    GenerationRecord, HistoryLimits, HistoryStore, KeyValueStore, MemoryStore, HISTORY_KEY,
};
use genstudio::GenerationRequest;
use proptest::prelude::*;

fn record(id: u64, prompt: &str) -> GenerationRecord {
    GenerationRecord::new(
        id.to_string(),
        "data:image/png;base64,iVBORw0KGgo=",
        &GenerationRequest::new(prompt),
        id as i64,
    )
}

/// Most-recent-first records with distinct, descending ids.
fn history_of(prompts: &[String]) -> Vec<GenerationRecord> {
    let n = prompts.len() as u64;
    prompts
        .iter()
        .enumerate()
        .map(|(i, p)| record(n - i as u64, p))
        .collect()
}

fn open_with(records: &[GenerationRecord]) -> HistoryStore {
    let mut storage = MemoryStore::new();
    storage
        .set(HISTORY_KEY, &serde_json::to_string(records).unwrap())
        .unwrap();
    HistoryStore::open(Box::new(storage), HistoryLimits::default())
}

fn persisted(store: &HistoryStore) -> Vec<GenerationRecord> {
    store
        .storage()
        .get(HISTORY_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
        .unwrap_or_default()
}

proptest! {
    #[test]
    fn append_never_exceeds_capacity(prompts in prop::collection::vec("[a-z ]{0,12}", 0..30)) {
        let mut store = HistoryStore::open(Box::new(MemoryStore::new()), HistoryLimits::default());
        for (i, p) in prompts.iter().enumerate() {
            store.append(record(i as u64 + 1, p)).unwrap();
            prop_assert!(store.len() <= 10);
            prop_assert_eq!(&store.records()[0].id, &(i as u64 + 1).to_string());
        }
        prop_assert_eq!(store.len(), prompts.len().min(10));
        prop_assert_eq!(persisted(&store), store.records().to_vec());
    }

    #[test]
    fn append_to_full_history_drops_oldest(prompts in prop::collection::vec("[a-z]{1,8}", 11..20)) {
        let records = history_of(&prompts);
        let mut store = open_with(&records);
        prop_assert_eq!(store.len(), 10);

        let newest = records.len() as u64 + 1;
        store.append(record(newest, "fresh")).unwrap();

        prop_assert_eq!(store.len(), 10);
        prop_assert_eq!(&store.records()[0].id, &newest.to_string());
        prop_assert_eq!(&store.records()[1..], &records[..9]);
    }

    #[test]
    fn remove_drops_exactly_one(prompts in prop::collection::vec("[a-z]{1,8}", 1..10), pick in any::<prop::sample::Index>()) {
        let records = history_of(&prompts);
        let mut store = open_with(&records);
        let victim = pick.get(&records).id.clone();

        store.remove(&victim).unwrap();

        let expected: Vec<_> = records.iter().filter(|r| r.id != victim).cloned().collect();
        prop_assert_eq!(store.records().to_vec(), expected);
        prop_assert_eq!(store.len(), records.len() - 1);
    }

    #[test]
    fn remove_absent_id_is_noop(prompts in prop::collection::vec("[a-z]{1,8}", 0..10)) {
        let records = history_of(&prompts);
        let mut store = open_with(&records);
        prop_assert_eq!(store.remove("does-not-exist").unwrap(), None);
        prop_assert_eq!(store.records().to_vec(), records);
    }

    #[test]
    fn filter_matches_case_insensitive_substring(
        prompts in prop::collection::vec("[a-zA-Z ]{0,12}", 0..10),
        query in "[a-zA-Z]{0,3}",
    ) {
        let store = open_with(&history_of(&prompts));
        let needle = query.to_lowercase();

        let got: Vec<_> = store.filter(&query).into_iter().cloned().collect();
        let expected: Vec<_> = store
            .records()
            .iter()
            .filter(|r| r.prompt.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(store.filter("").len(), store.len());
    }
}

#[test]
fn remove_scenario() {
    let mut store = open_with(&[record(1, "A"), record(2, "B")]);
    store.remove("2").unwrap();
    assert_eq!(store.records().to_vec(), vec![record(1, "A")]);
}

#[test]
fn clear_then_load_is_empty() {
    let mut store = open_with(&[record(2, "B"), record(1, "A")]);
    store.clear().unwrap();
    assert_eq!(store.load(), 0);
    assert!(store.is_empty());
}
