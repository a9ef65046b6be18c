//! In-memory holder of the last known version of each record.
//!
//! Each id owns a slot whose current snapshot is swapped atomically, the same
//! way a table buffer is swapped on commit. Subscribers of an id are called
//! after every `put` or `remove` for it, outside of any cache lock, so a
//! callback may read from or write to the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};

use crate::record::{RecordId, RecordSnapshot};

/// Change callback. Receives the new snapshot, or `None` once the record is gone.
pub type ChangeFn = dyn Fn(Option<Arc<RecordSnapshot>>) + Send + Sync;

/// Shared state between a subscriber entry and its handle.
#[derive(Debug)]
struct SubscriberState {
    active: AtomicBool,
    /// Id the subscriber currently follows (changes on `promote`)
    record: Mutex<RecordId>,
}

#[derive(Clone)]
struct Subscriber {
    key: u64,
    state: Arc<SubscriberState>,
    callback: Arc<ChangeFn>,
}

#[derive(Default)]
struct Slot {
    current: ArcSwapOption<RecordSnapshot>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Slot {
    fn is_vacant(&self) -> bool {
        self.current.load().is_none() && self.subscribers.lock().is_empty()
    }
}

#[derive(Default)]
struct CacheInner {
    slots: RwLock<HashMap<RecordId, Arc<Slot>>>,
    next_key: AtomicU64,
}

impl CacheInner {
    fn slot(&self, id: &RecordId) -> Option<Arc<Slot>> {
        self.slots.read().get(id).cloned()
    }

    /// Runs `f` on the slot for `id`, creating it if needed.
    ///
    /// `f` runs while the slot map is locked so `prune` cannot drop the slot
    /// underneath it; it must not call back into the cache.
    fn with_slot<R>(&self, id: &RecordId, f: impl FnOnce(&Arc<Slot>) -> R) -> R {
        {
            let slots = self.slots.read();
            if let Some(slot) = slots.get(id) {
                return f(slot);
            }
        }
        let mut slots = self.slots.write();
        f(slots.entry(id.clone()).or_default())
    }

    /// Drops the slot for `id` when it holds nothing and nobody listens.
    fn prune(&self, id: &RecordId) {
        let mut slots = self.slots.write();
        if slots.get(id).is_some_and(|slot| slot.is_vacant()) {
            slots.remove(id);
        }
    }

    fn unsubscribe(&self, state: &SubscriberState, key: u64) {
        let id = state.record.lock().clone();
        if let Some(slot) = self.slot(&id) {
            slot.subscribers.lock().retain(|s| s.key != key);
            self.prune(&id);
        }
    }
}

/// Last-known-good snapshots of zero or more records, exposed by id.
///
/// Cloning yields another handle to the same cache.
#[derive(Clone, Default)]
pub struct RecordCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("records", &self.len())
            .finish()
    }
}

impl RecordCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot for `id`, or `None` if never loaded or removed.
    pub fn get(&self, id: &RecordId) -> Option<Arc<RecordSnapshot>> {
        self.inner.slot(id).and_then(|slot| slot.current.load_full())
    }

    /// Replaces the snapshot for `id` unconditionally and notifies subscribers.
    ///
    /// Used for confirmed reads, pushed updates, optimistic values and
    /// rollbacks alike; the last `put` wins.
    pub fn put(&self, id: &RecordId, snapshot: impl Into<Arc<RecordSnapshot>>) {
        let snapshot = snapshot.into();
        let slot = self.inner.with_slot(id, |slot| {
            slot.current.store(Some(Arc::clone(&snapshot)));
            Arc::clone(slot)
        });
        tracing::trace!(record = %id, origin = ?snapshot.origin(), "Cache put");
        notify(&slot, Some(snapshot));
    }

    /// Drops the snapshot for `id` and notifies subscribers with `None`.
    ///
    /// Returns the snapshot that was held, if any.
    pub fn remove(&self, id: &RecordId) -> Option<Arc<RecordSnapshot>> {
        let slot = self.inner.slot(id)?;
        let previous = slot.current.swap(None);
        tracing::trace!(record = %id, "Cache remove");
        notify(&slot, None);
        self.inner.prune(id);
        previous
    }

    /// Moves the entry held under `from` to the snapshot's own id.
    ///
    /// Subscribers of `from` receive the snapshot and follow the new id from
    /// then on. Used once a record created under a provisional id has been
    /// assigned its canonical id by the store.
    pub fn promote(&self, from: &RecordId, snapshot: impl Into<Arc<RecordSnapshot>>) {
        let snapshot = snapshot.into();
        let to = snapshot.id().clone();
        if &to == from {
            self.put(&to, snapshot);
            return;
        }

        let target = {
            let mut slots = self.inner.slots.write();
            let moved = slots.remove(from);
            let target = Arc::clone(slots.entry(to.clone()).or_default());
            if let Some(old) = moved {
                let mut incoming = std::mem::take(&mut *old.subscribers.lock());
                for subscriber in &incoming {
                    *subscriber.state.record.lock() = to.clone();
                }
                target.subscribers.lock().append(&mut incoming);
            }
            target.current.store(Some(Arc::clone(&snapshot)));
            target
        };

        tracing::debug!(from = %from, to = %to, "Promoted provisional record");
        notify(&target, Some(snapshot));
    }

    /// Registers a callback invoked on every `put`, `remove` or `promote` for `id`.
    ///
    /// The callback stays registered until the returned handle is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, id: &RecordId, on_change: F) -> Subscription
    where
        F: Fn(Option<Arc<RecordSnapshot>>) + Send + Sync + 'static,
    {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(SubscriberState {
            active: AtomicBool::new(true),
            record: Mutex::new(id.clone()),
        });
        let subscriber = Subscriber {
            key,
            state: Arc::clone(&state),
            callback: Arc::new(on_change),
        };
        self.inner
            .with_slot(id, |slot| slot.subscribers.lock().push(subscriber));

        Subscription {
            cache: Arc::downgrade(&self.inner),
            state,
            key,
        }
    }

    /// Number of live subscribers for `id`.
    pub fn subscriber_count(&self, id: &RecordId) -> usize {
        self.inner
            .slot(id)
            .map(|slot| slot.subscribers.lock().len())
            .unwrap_or(0)
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .read()
            .values()
            .filter(|slot| slot.current.load().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all records currently held, sorted.
    pub fn ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .inner
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.current.load().is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

fn notify(slot: &Slot, value: Option<Arc<RecordSnapshot>>) {
    let subscribers: Vec<Subscriber> = slot.subscribers.lock().clone();
    for subscriber in subscribers {
        if subscriber.state.active.load(Ordering::Acquire) {
            (subscriber.callback)(value.clone());
        }
    }
}

/// Handle to a cache subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    cache: Weak<CacheInner>,
    state: Arc<SubscriberState>,
    key: u64,
}

impl Subscription {
    /// Stops further callbacks immediately. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        if !self.state.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.cache.upgrade() {
            inner.unsubscribe(&self.state, self.key);
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// Id this subscription currently follows.
    pub fn record_id(&self) -> RecordId {
        self.state.record.lock().clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
