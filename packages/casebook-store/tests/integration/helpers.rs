//! Shared fixtures for integration tests.

use std::sync::Arc;

use casebook_core::schema::catalog;
use casebook_core::{
    Document, OptimisticController, Record, RecordCache, RecordId, RecordLoader, RecordSchema,
    RecordSnapshot, SnapshotOrigin, Subscription,
};
use casebook_store::{MemoryStore, MemoryStoreConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const JANE: &str = "client001";

/// Every value delivered to one subscriber: origin and `metadata.status`.
pub type Log = Arc<Mutex<Vec<Option<(SnapshotOrigin, Option<String>)>>>>;

pub struct Fixture {
    pub store: MemoryStore,
    pub cache: RecordCache,
    pub controller: OptimisticController,
    pub loader: RecordLoader,
}

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

/// Jane Doe, a prospect, as stored before anyone edits her.
pub fn jane() -> Record {
    Record::new(
        JANE,
        "clients",
        doc(json!({
            "profile": {"firstName": "Jane", "lastName": "Doe", "dob": "1990-04-02", "age": 34},
            "referralSource": "Self",
            "auditChecklist": [],
            "metadata": {
                "createdBy": "admin01",
                "lastModifiedBy": "admin01",
                "clientType": "General Population",
                "status": "Prospect",
                "assignedAdminId": "admin01",
                "assignedAdminName": "Ada Admin"
            }
        })),
    )
}

pub fn client_schema() -> Arc<RecordSchema> {
    Arc::new(catalog::client())
}

/// Store holding Jane, with created ids `rec001`, `rec002`, ...
pub fn fixture() -> Fixture {
    fixture_with(MemoryStoreConfig {
        id_prefix: Some("rec".to_string()),
        ..Default::default()
    })
}

pub fn fixture_with(config: MemoryStoreConfig) -> Fixture {
    let store = MemoryStore::with_config(config);
    store.insert(jane());
    let cache = RecordCache::new();
    let controller = OptimisticController::new(cache.clone(), Arc::new(store.clone()));
    let loader = RecordLoader::new(cache.clone(), Arc::new(store.clone()));
    Fixture {
        store,
        cache,
        controller,
        loader,
    }
}

/// Fixture with Jane already fetched into the cache.
pub async fn loaded_fixture() -> Fixture {
    let fixture = fixture();
    fixture
        .loader
        .fetch(&RecordId::new(JANE))
        .await
        .expect("seeded client should load");
    fixture
}

pub fn status(snapshot: &RecordSnapshot) -> Option<String> {
    snapshot
        .record()
        .field("metadata.status")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Subscribes to `id` and records each delivery.
pub fn record_log(cache: &RecordCache, id: &RecordId) -> (Subscription, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let subscription = cache.subscribe(id, move |value| {
        sink.lock()
            .push(value.map(|snapshot| (snapshot.origin(), status(&snapshot))));
    });
    (subscription, log)
}
