//! Progress store concurrency integration tests.
//!
//! These tests verify that claims are exclusive when several workers, or
//! several connections to the same database file, race for pending items.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use tempfile::TempDir;

use artvault_core::{
    testing::fixtures, ArtworkIdentifier, ItemStatus, MuseumTag, ProgressStore,
    SqliteProgressStore,
};

fn seed(store: &dyn ProgressStore, count: usize) -> Vec<ArtworkIdentifier> {
    let ids: Vec<ArtworkIdentifier> = (1..=count)
        .map(|i| ArtworkIdentifier::new(MuseumTag::Aic, i.to_string()))
        .collect();
    assert_eq!(store.upsert_pending_batch(&ids).unwrap(), count);
    ids
}

/// Claim batches until the store runs dry; returns everything this worker got.
fn drain(store: &dyn ProgressStore, batch: usize) -> Vec<ArtworkIdentifier> {
    let mut claimed = Vec::new();
    loop {
        let items = store
            .claim_next_batch(MuseumTag::Aic, batch, Utc::now())
            .unwrap();
        if items.is_empty() {
            return claimed;
        }
        for item in items {
            assert_eq!(item.status, ItemStatus::InProgress);
            claimed.push(item.identifier);
        }
    }
}

fn assert_claimed_exactly_once(claimed: Vec<Vec<ArtworkIdentifier>>, expected: usize) {
    let all: Vec<ArtworkIdentifier> = claimed.into_iter().flatten().collect();
    let unique: HashSet<&ArtworkIdentifier> = all.iter().collect();
    assert_eq!(all.len(), expected, "every item claimed");
    assert_eq!(unique.len(), expected, "no item claimed twice");
}

#[test]
fn test_no_double_claim_with_shared_store() {
    let store = Arc::new(SqliteProgressStore::in_memory().unwrap());
    seed(store.as_ref(), 200);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || drain(store.as_ref(), 7))
        })
        .collect();
    let claimed = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_claimed_exactly_once(claimed, 200);
    assert_eq!(store.summary(MuseumTag::Aic).unwrap().in_progress, 200);
}

#[test]
fn test_no_double_claim_across_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("progress.db");

    let stores: Vec<SqliteProgressStore> = (0..4)
        .map(|_| SqliteProgressStore::new(&db_path).unwrap())
        .collect();
    seed(&stores[0], 120);

    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| thread::spawn(move || drain(&store, 5)))
        .collect();
    let claimed = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_claimed_exactly_once(claimed, 120);
}

#[test]
fn test_concurrent_upserts_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("progress.db");
    let ids = fixtures::identifiers(MuseumTag::Met, &["1", "2", "3", "4", "5"]);

    let stores: Vec<SqliteProgressStore> = (0..4)
        .map(|_| SqliteProgressStore::new(&db_path).unwrap())
        .collect();
    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let ids = ids.clone();
            thread::spawn(move || {
                ids.iter()
                    .filter(|id| store.upsert_pending(id).unwrap())
                    .count()
            })
        })
        .collect();
    let inserted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(inserted, 5);
    let store = SqliteProgressStore::new(&db_path).unwrap();
    assert_eq!(store.summary(MuseumTag::Met).unwrap().pending, 5);
}
