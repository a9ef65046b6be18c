//! In-memory `RemoteStore` and `PushSource`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use casebook_core::record::merge_documents;
use casebook_core::remote::{ErrorFn, RecordFn};
use casebook_core::{
    Document, ListenerHandle, NewRecord, PushSource, Record, RecordId, RemoteStore, StoreError,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use crate::config::MemoryStoreConfig;

type RecordCallback = Arc<dyn Fn(Option<Record>) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

struct Listener {
    key: u64,
    on_record: RecordCallback,
    on_error: ErrorCallback,
}

struct StoreInner {
    config: MemoryStoreConfig,
    records: Mutex<HashMap<RecordId, Record>>,
    listeners: Mutex<HashMap<RecordId, Vec<Listener>>>,
    next_listener: AtomicU64,
    next_id: AtomicU64,
    failing_writes: Mutex<VecDeque<StoreError>>,
    failing_fetches: Mutex<VecDeque<StoreError>>,
    /// Number of live `WriteGate`s; writes wait while it is non-zero
    holds: watch::Sender<usize>,
    writes: AtomicUsize,
    fetches: AtomicUsize,
}

impl StoreInner {
    fn notify(&self, id: &RecordId, value: Option<Record>) {
        let callbacks: Vec<RecordCallback> = match self.listeners.lock().get(id) {
            Some(listeners) => listeners.iter().map(|l| Arc::clone(&l.on_record)).collect(),
            None => return,
        };
        for on_record in callbacks {
            on_record(value.clone());
        }
    }

    fn remove_listener(&self, id: &RecordId, key: u64) {
        let mut listeners = self.listeners.lock();
        if let Some(entries) = listeners.get_mut(id) {
            entries.retain(|l| l.key != key);
            if entries.is_empty() {
                listeners.remove(id);
            }
        }
    }

    fn assign_id(&self) -> RecordId {
        match &self.config.id_prefix {
            Some(prefix) => {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                RecordId::new(format!("{prefix}{n:03}"))
            }
            None => RecordId::new(uuid::Uuid::new_v4().simple().to_string()),
        }
    }

    fn stamp(&self, fields: &mut Document, created: bool) {
        let now = Value::from(Utc::now().timestamp_millis());
        if created {
            if let Some(field) = &self.config.created_at_field {
                fields.insert(field.clone(), now.clone());
            }
        }
        if let Some(field) = &self.config.updated_at_field {
            fields.insert(field.clone(), now);
        }
    }

    async fn delay(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    async fn wait_until_released(&self) {
        let mut rx = self.holds.subscribe();
        let _ = rx.wait_for(|held| *held == 0).await;
    }

    /// Common prologue of every write: count, delay, honor holds, and
    /// report an injected failure if one was queued.
    async fn begin_write(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let injected = self.failing_writes.lock().pop_front();
        self.delay().await;
        self.wait_until_released().await;
        match injected {
            Some(error) => {
                tracing::debug!("Injected write failure: {}", error);
                Err(error)
            }
            None => Ok(()),
        }
    }
}

/// Document store held in process memory.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        let (holds, _) = watch::channel(0usize);
        Self {
            inner: Arc::new(StoreInner {
                config,
                records: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(0),
                next_id: AtomicU64::new(0),
                failing_writes: Mutex::new(VecDeque::new()),
                failing_fetches: Mutex::new(VecDeque::new()),
                holds,
                writes: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MemoryStoreConfig {
        &self.inner.config
    }

    /// Stores `record` as is, replacing any document with the same id.
    ///
    /// Listeners on the id receive the new value. Not counted as a write.
    pub fn insert(&self, record: Record) {
        let id = record.id.clone();
        self.inner.records.lock().insert(id.clone(), record.clone());
        self.inner.notify(&id, Some(record));
    }

    /// Returns the stored document without simulated latency.
    pub fn stored(&self, id: &RecordId) -> Option<Record> {
        self.inner.records.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.lock().is_empty()
    }

    /// Ids of stored documents, sorted.
    pub fn ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<_> = self.inner.records.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Makes the next create or merge update fail with `error`.
    ///
    /// Failures queue up; each write consumes one.
    pub fn fail_next_write(&self, error: StoreError) {
        self.inner.failing_writes.lock().push_back(error);
    }

    /// Makes the next fetch fail with `error`.
    pub fn fail_next_fetch(&self, error: StoreError) {
        self.inner.failing_fetches.lock().push_back(error);
    }

    /// Holds all writes until the returned gate is released or dropped.
    ///
    /// Held writes are already counted by `write_count`.
    pub fn hold_writes(&self) -> WriteGate {
        self.inner.holds.send_modify(|held| *held += 1);
        WriteGate {
            inner: Arc::clone(&self.inner),
            released: AtomicBool::new(false),
        }
    }

    /// Number of creates and merge updates issued, including failed ones.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Applies a change made by another client.
    ///
    /// Merges `fields` into the stored document, stamps the update time,
    /// and pushes the result to listeners. Returns `None` if the document
    /// does not exist.
    pub fn external_update(&self, id: &RecordId, fields: Document) -> Option<Record> {
        let updated = {
            let mut records = self.inner.records.lock();
            let stored = records.get_mut(id)?;
            merge_documents(&mut stored.fields, &fields);
            self.inner.stamp(&mut stored.fields, false);
            stored.clone()
        };
        tracing::debug!(record = %id, "External update");
        self.inner.notify(id, Some(updated.clone()));
        Some(updated)
    }

    /// Deletes a document on behalf of another client and pushes `None`.
    pub fn external_delete(&self, id: &RecordId) -> Option<Record> {
        let removed = self.inner.records.lock().remove(id)?;
        tracing::debug!(record = %id, "External delete");
        self.inner.notify(id, None);
        Some(removed)
    }

    /// Reports `error` to every listener on `id`.
    pub fn broadcast_error(&self, id: &RecordId, error: StoreError) {
        let callbacks: Vec<ErrorCallback> = match self.inner.listeners.lock().get(id) {
            Some(listeners) => listeners.iter().map(|l| Arc::clone(&l.on_error)).collect(),
            None => return,
        };
        for on_error in callbacks {
            on_error(error.clone());
        }
    }

    pub fn listener_count(&self, id: &RecordId) -> usize {
        self.inner
            .listeners
            .lock()
            .get(id)
            .map_or(0, |listeners| listeners.len())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("config", &self.inner.config)
            .field("records", &self.len())
            .field("writes", &self.write_count())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        let injected = self.inner.failing_fetches.lock().pop_front();
        self.inner.delay().await;
        if let Some(error) = injected {
            tracing::debug!(record = %id, "Injected fetch failure: {}", error);
            return Err(error);
        }
        Ok(self.stored(id))
    }

    async fn create(&self, record: NewRecord) -> Result<Record, StoreError> {
        self.inner.begin_write().await?;

        let id = self.inner.assign_id();
        let mut created = record.with_id(id.clone());
        self.inner.stamp(&mut created.fields, true);
        self.inner
            .records
            .lock()
            .insert(id.clone(), created.clone());
        tracing::debug!(record = %id, collection = %created.collection, "Created record");

        self.inner.notify(&id, Some(created.clone()));
        Ok(created)
    }

    async fn merge_update(&self, id: &RecordId, fields: Document) -> Result<Record, StoreError> {
        self.inner.begin_write().await?;

        let updated = {
            let mut records = self.inner.records.lock();
            let stored = records
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            merge_documents(&mut stored.fields, &fields);
            self.inner.stamp(&mut stored.fields, false);
            stored.clone()
        };
        tracing::debug!(record = %id, "Merged update");

        self.inner.notify(id, Some(updated.clone()));
        Ok(updated)
    }
}

impl PushSource for MemoryStore {
    /// Registers the listener and immediately delivers the current value
    /// (`None` when the document does not exist).
    fn listen(&self, id: &RecordId, on_record: RecordFn, on_error: ErrorFn) -> ListenerHandle {
        let key = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let on_record: RecordCallback = Arc::from(on_record);
        self.inner
            .listeners
            .lock()
            .entry(id.clone())
            .or_default()
            .push(Listener {
                key,
                on_record: Arc::clone(&on_record),
                on_error: Arc::from(on_error),
            });

        on_record(self.stored(id));

        let inner: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let id = id.clone();
        ListenerHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.remove_listener(&id, key);
            }
        })
    }
}

/// Keeps writes on a `MemoryStore` waiting until released.
pub struct WriteGate {
    inner: Arc<StoreInner>,
    released: AtomicBool,
}

impl WriteGate {
    /// Lets held writes proceed. Idempotent.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.inner
                .holds
                .send_modify(|held| *held = held.saturating_sub(1));
        }
    }

    pub fn is_held(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WriteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGate")
            .field("held", &self.is_held())
            .finish()
    }
}

impl Drop for WriteGate {
    fn drop(&mut self) {
        self.release();
    }
}
