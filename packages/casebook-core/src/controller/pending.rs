//! In-flight write registry and its rollback guard.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::RecordCache;
use crate::error::SyncError;
use crate::record::{RecordId, RecordSnapshot};

/// One in-flight save.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    /// Value to restore if the write fails; `None` if the record was absent
    pub rollback: Option<Arc<RecordSnapshot>>,
    /// Value applied optimistically
    pub proposed: Arc<RecordSnapshot>,
    pub issued_at: Instant,
}

/// At most one pending write per record id.
#[derive(Debug, Default)]
pub(crate) struct PendingWrites {
    writes: Mutex<HashMap<RecordId, PendingWrite>>,
}

impl PendingWrites {
    /// Registers a write for `id`, capturing the rollback target from `cache`.
    ///
    /// Fails with `Conflict` if a write for `id` is already registered. The
    /// check and the capture happen under one lock.
    pub fn register(
        &self,
        cache: &RecordCache,
        id: &RecordId,
        proposed: Arc<RecordSnapshot>,
    ) -> Result<(), SyncError> {
        let mut writes = self.writes.lock();
        if writes.contains_key(id) {
            return Err(SyncError::Conflict { id: id.clone() });
        }
        writes.insert(
            id.clone(),
            PendingWrite {
                rollback: cache.get(id),
                proposed,
                issued_at: Instant::now(),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &RecordId) -> Option<PendingWrite> {
        self.writes.lock().get(id).cloned()
    }

    pub fn clear(&self, id: &RecordId) -> Option<PendingWrite> {
        self.writes.lock().remove(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.writes.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.writes.lock().len()
    }
}

/// Resolves a pending write exactly once.
///
/// Created as soon as the write is registered and moved into the write
/// task. If dropped unresolved (a subscriber panicked during the optimistic
/// publish, the task panicked, or the task never ran), the cache is rolled
/// back and the id becomes free again.
pub(crate) struct WriteGuard {
    cache: RecordCache,
    pending: Arc<PendingWrites>,
    id: RecordId,
    resolved: bool,
}

impl WriteGuard {
    pub fn new(cache: RecordCache, pending: Arc<PendingWrites>, id: RecordId) -> Self {
        Self {
            cache,
            pending,
            id,
            resolved: false,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Publishes the store's value and clears the pending write.
    pub fn commit(mut self, from: &RecordId, confirmed: Arc<RecordSnapshot>) {
        self.resolved = true;
        self.cache.promote(from, confirmed);
        self.pending.clear(&self.id);
    }

    /// Restores the pre-save value and clears the pending write.
    pub fn rollback(mut self) {
        self.resolved = true;
        self.restore();
    }

    fn restore(&self) {
        match self.pending.get(&self.id).and_then(|write| write.rollback) {
            Some(previous) => self.cache.put(&self.id, previous),
            None => {
                self.cache.remove(&self.id);
            }
        }
        self.pending.clear(&self.id);
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!("Write for record {} ended unresolved, rolling back", self.id);
            self.restore();
        }
    }
}
