//! Interfaces of the document store backing the cache.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::record::{Document, NewRecord, Record, RecordId};

/// Document database keyed by record id.
///
/// Every call is an independent network operation that may fail with a
/// transient `StoreError::Network` or a permanent `StoreError::Rejected`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads one document. `Ok(None)` means it does not exist.
    async fn fetch(&self, id: &RecordId) -> Result<Option<Record>, StoreError>;

    /// Creates a document and returns it with the id the store assigned.
    async fn create(&self, record: NewRecord) -> Result<Record, StoreError>;

    /// Merges `fields` into an existing document and returns the canonical
    /// post-write value.
    async fn merge_update(&self, id: &RecordId, fields: Document) -> Result<Record, StoreError>;
}

/// Callback receiving each pushed value; `None` reports deletion.
pub type RecordFn = Box<dyn Fn(Option<Record>) + Send + Sync>;

/// Callback receiving listener failures.
pub type ErrorFn = Box<dyn Fn(StoreError) + Send + Sync>;

/// Push-based change feed for individual documents.
pub trait PushSource: Send + Sync {
    /// Starts delivering the document's current and future values.
    fn listen(&self, id: &RecordId, on_record: RecordFn, on_error: ErrorFn) -> ListenerHandle;
}

/// Detaches a push listener when unsubscribed or dropped.
pub struct ListenerHandle {
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ListenerHandle {
    /// Wraps the store-specific detach action.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Mutex::new(Some(Box::new(detach))),
        }
    }

    /// Detaches the listener. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.detach.lock().is_some()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
