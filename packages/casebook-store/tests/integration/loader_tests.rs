//! Loading tests: one-shot fetches and background watches.

use std::time::Duration;

use casebook_core::{RecordId, StoreError, SyncError};
use casebook_store::MemoryStoreConfig;

use super::helpers::{fixture, fixture_with, status, JANE};

#[tokio::test]
async fn test_fetch_loads_remote_snapshot() {
    let fixture = fixture();
    let id = RecordId::new(JANE);

    let snapshot = fixture.loader.fetch(&id).await.unwrap();
    assert!(!snapshot.is_optimistic());
    assert_eq!(status(&snapshot).as_deref(), Some("Prospect"));
    assert!(fixture.cache.get(&id).unwrap().same_record(&snapshot));
}

#[tokio::test]
async fn test_fetch_missing_record() {
    let fixture = fixture();
    let id = RecordId::new("client404");

    let err = fixture.loader.fetch(&id).await.unwrap_err();
    assert_eq!(err, SyncError::NotFound { id: id.clone() });
    assert!(fixture.cache.get(&id).is_none());
}

#[tokio::test]
async fn test_fetch_failure_leaves_cache_untouched() {
    let fixture = fixture();
    let id = RecordId::new(JANE);
    fixture
        .store
        .fail_next_fetch(StoreError::Network("unavailable".to_string()));

    let err = fixture.loader.fetch(&id).await.unwrap_err();
    assert_eq!(
        err,
        SyncError::Store(StoreError::Network("unavailable".to_string()))
    );
    assert!(fixture.cache.get(&id).is_none());
    assert_eq!(fixture.loader.failed_fetches(), 1);
}

#[tokio::test]
async fn test_watch_delivers_loaded_record() {
    let fixture = fixture_with(MemoryStoreConfig {
        latency_ms: 10,
        ..Default::default()
    });
    let id = RecordId::new(JANE);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let _sub = fixture.loader.watch(&id, move |value| {
        let _ = tx.send(value.is_some());
    });

    let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap();
    assert_eq!(delivered, Some(true));
    assert!(fixture.cache.get(&id).is_some());
}

#[tokio::test]
async fn test_watch_result_discarded_after_unsubscribe() {
    let fixture = fixture_with(MemoryStoreConfig {
        latency_ms: 20,
        ..Default::default()
    });
    let id = RecordId::new(JANE);

    let sub = fixture.loader.watch(&id, |_| {});
    drop(sub);
    tokio::time::timeout(Duration::from_secs(1), async {
        while fixture.loader.discarded_fetches() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(fixture.store.fetch_count(), 1);
    assert!(fixture.cache.get(&id).is_none());
}
