//! Populating the record cache from the store.
//!
//! Reads arrive either as one-shot fetches or through a push listener. Both
//! end in a `put` (or a `remove` when the store reports the record gone).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::{RecordCache, Subscription};
use crate::error::{StoreError, SyncError};
use crate::record::{Record, RecordId, RecordSnapshot};
use crate::remote::{ListenerHandle, PushSource, RemoteStore};

/// Loads records from a `RemoteStore` into a `RecordCache`.
#[derive(Clone)]
pub struct RecordLoader {
    cache: RecordCache,
    store: Arc<dyn RemoteStore>,
    failed_fetches: Arc<AtomicU64>,
    discarded_fetches: Arc<AtomicU64>,
}

impl RecordLoader {
    pub fn new(cache: RecordCache, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache,
            store,
            failed_fetches: Arc::new(AtomicU64::new(0)),
            discarded_fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Fetches `id` once and publishes the result to the cache.
    ///
    /// # Errors
    /// `NotFound` when the store has no such record (the cache entry is
    /// removed), `Store` when the fetch itself fails (the cache is untouched).
    pub async fn fetch(&self, id: &RecordId) -> crate::Result<Arc<RecordSnapshot>> {
        let fetched = self.store.fetch(id).await.map_err(|e| {
            self.failed_fetches.fetch_add(1, Ordering::Relaxed);
            SyncError::Store(e)
        })?;
        publish(&self.cache, id, fetched.map(RecordSnapshot::remote))
            .ok_or_else(|| SyncError::NotFound { id: id.clone() })
    }

    /// Subscribes to `id` and loads it in the background.
    ///
    /// The fetched value is published only if somebody still subscribes to
    /// `id` when the fetch completes; otherwise it is discarded. Dropping the
    /// returned subscription does not cancel the fetch. Must be called from
    /// within a Tokio runtime.
    pub fn watch<F>(&self, id: &RecordId, on_change: F) -> Subscription
    where
        F: Fn(Option<Arc<RecordSnapshot>>) + Send + Sync + 'static,
    {
        let subscription = self.cache.subscribe(id, on_change);

        let cache = self.cache.clone();
        let store = Arc::clone(&self.store);
        let failed = Arc::clone(&self.failed_fetches);
        let discarded = Arc::clone(&self.discarded_fetches);
        let id = id.clone();
        tokio::spawn(async move {
            match store.fetch(&id).await {
                Ok(fetched) => {
                    if cache.subscriber_count(&id) == 0 {
                        tracing::debug!(record = %id, "No subscribers left, discarding fetch result");
                        discarded.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                    publish(&cache, &id, fetched.map(RecordSnapshot::remote));
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(record = %id, "Background fetch failed: {}", e);
                }
            }
        });

        subscription
    }

    /// Keeps `id` current from `source` until the returned view is dropped.
    pub fn follow(&self, source: &dyn PushSource, id: &RecordId) -> LiveView {
        LiveView::attach(&self.cache, source, id)
    }

    /// Number of fetches that failed since the loader was created.
    pub fn failed_fetches(&self) -> u64 {
        self.failed_fetches.load(Ordering::Relaxed)
    }

    /// Number of background fetch results dropped because nobody was
    /// subscribed any more when they arrived.
    pub fn discarded_fetches(&self) -> u64 {
        self.discarded_fetches.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RecordLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLoader")
            .field("cache", &self.cache)
            .field("failed_fetches", &self.failed_fetches())
            .field("discarded_fetches", &self.discarded_fetches())
            .finish()
    }
}

fn publish(
    cache: &RecordCache,
    id: &RecordId,
    snapshot: Option<RecordSnapshot>,
) -> Option<Arc<RecordSnapshot>> {
    match snapshot {
        Some(snapshot) => {
            let snapshot = Arc::new(snapshot);
            cache.put(id, Arc::clone(&snapshot));
            Some(snapshot)
        }
        None => {
            cache.remove(id);
            None
        }
    }
}

/// Push listener feeding one record into the cache.
///
/// Every pushed value is `put` as it arrives, so a push during a pending
/// save replaces the optimistic value (last `put` wins). Dropping the view
/// detaches the listener.
#[derive(Debug)]
pub struct LiveView {
    id: RecordId,
    handle: ListenerHandle,
    errors: Arc<AtomicU64>,
}

impl LiveView {
    /// Attaches a listener for `id` on `source` that publishes into `cache`.
    pub fn attach(cache: &RecordCache, source: &dyn PushSource, id: &RecordId) -> Self {
        let errors = Arc::new(AtomicU64::new(0));

        let record_cache = cache.clone();
        let record_id = id.clone();
        let error_count = Arc::clone(&errors);
        let error_id = id.clone();

        let handle = source.listen(
            id,
            Box::new(move |record: Option<Record>| {
                publish(&record_cache, &record_id, record.map(RecordSnapshot::remote));
            }),
            Box::new(move |error: StoreError| {
                error_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(record = %error_id, "Push listener error: {}", error);
            }),
        );
        tracing::debug!(record = %id, "Attached live view");

        Self {
            id: id.clone(),
            handle,
            errors,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Number of listener errors reported so far.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Stops receiving pushes. Idempotent.
    pub fn detach(&self) {
        self.handle.unsubscribe();
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_attached()
    }
}
