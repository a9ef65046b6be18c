//! Scripted store double for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::error::StoreError;
use crate::record::{merge_documents, Document, NewRecord, Record, RecordId};
use crate::remote::RemoteStore;

/// What the next write does before answering.
pub(crate) enum Step {
    /// Wait until the paired sender fires (or is dropped)
    Hold(oneshot::Receiver<()>),
    Fail(StoreError),
    Panic,
}

/// In-memory store whose writes follow a queued script.
///
/// Confirmed writes carry a `revision` field bumped by the store, so the
/// confirmed value always differs from the optimistic one.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    records: Mutex<HashMap<RecordId, Record>>,
    script: Mutex<VecDeque<Step>>,
    writes: AtomicUsize,
    fetches: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Record) {
        self.records.lock().insert(record.id.clone(), record);
    }

    pub fn stored(&self, id: &str) -> Option<Record> {
        self.records.lock().get(&RecordId::new(id)).cloned()
    }

    /// Holds the next write until the returned sender fires.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Step::Hold(rx));
        tx
    }

    pub fn fail_next(&self, error: StoreError) {
        self.script.lock().push_back(Step::Fail(error));
    }

    pub fn panic_next(&self) {
        self.script.lock().push_back(Step::Panic);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn run_script(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            None => Ok(()),
            Some(Step::Hold(rx)) => {
                let _ = rx.await;
                Ok(())
            }
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Panic) => panic!("scripted store panic"),
        }
    }

    fn bump_revision(fields: &mut Document) {
        let next = fields.get("revision").and_then(Value::as_u64).unwrap_or(0) + 1;
        fields.insert("revision".to_string(), json!(next));
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn fetch(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().get(id).cloned())
    }

    async fn create(&self, record: NewRecord) -> Result<Record, StoreError> {
        self.run_script().await?;
        let mut records = self.records.lock();
        let id = format!("rec{:03}", records.len() + 1);
        let mut created = record.with_id(id);
        Self::bump_revision(&mut created.fields);
        records.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn merge_update(&self, id: &RecordId, fields: Document) -> Result<Record, StoreError> {
        self.run_script().await?;
        let mut records = self.records.lock();
        let stored = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        merge_documents(&mut stored.fields, &fields);
        Self::bump_revision(&mut stored.fields);
        Ok(stored.clone())
    }
}
