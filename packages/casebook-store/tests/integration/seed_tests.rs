//! Seed loading tests.

use std::fs;

use casebook_core::RecordId;
use casebook_store::{MemoryStore, SeedError};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_load_seed_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("seed.json");
    fs::write(
        &path,
        json!({
            "clients": [
                {"id": "client001", "profile": {"firstName": "Jane"}},
                {"id": "client002", "profile": {"firstName": "Sam"}}
            ],
            "tasks": [
                {"id": "task001", "clientId": "client001", "status": "Pending"}
            ]
        })
        .to_string(),
    )?;

    let store = MemoryStore::new();
    assert_eq!(store.load_seed_file(&path)?, 3);
    assert_eq!(store.len(), 3);

    let task = store.stored(&RecordId::new("task001")).unwrap();
    assert_eq!(task.collection, "tasks");
    assert_eq!(task.field("status"), Some(&json!("Pending")));
    assert!(task.field("id").is_none());
    Ok(())
}

#[test]
fn test_seed_without_id_loads_nothing() {
    let store = MemoryStore::new();
    let err = store
        .load_seed(json!({
            "clients": [{"id": "client001"}, {"profile": {"firstName": "Nobody"}}]
        }))
        .unwrap_err();

    assert!(matches!(
        err,
        SeedError::MissingId { ref collection, index: 1 } if collection == "clients"
    ));
    assert!(store.is_empty());
}

#[test]
fn test_seed_layout_errors() {
    let store = MemoryStore::new();
    assert!(matches!(
        store.load_seed(json!([{"id": "client001"}])),
        Err(SeedError::Layout(_))
    ));
    assert!(matches!(
        store.load_seed(json!({"clients": {"id": "client001"}})),
        Err(SeedError::Layout(_))
    ));
}

#[test]
fn test_seed_file_errors() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new();

    assert!(matches!(
        store.load_seed_file(dir.path().join("missing.json")),
        Err(SeedError::Io(_))
    ));

    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        store.load_seed_file(&path),
        Err(SeedError::Parse(_))
    ));
}
