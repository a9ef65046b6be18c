//! Optimistic update controller.
//!
//! A save publishes the proposed record to the cache immediately, issues the
//! write to the store, then either replaces the optimistic value with the
//! store's canonical one or restores the value the cache held before the
//! save. At most one write per record id is in flight; a second save for the
//! same id fails fast with `Conflict` instead of queueing behind the first.
//!
//! Per-id state machine: `Idle -> Saving -> Idle`. No failure state persists.

mod pending;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::cache::RecordCache;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::record::{Document, Record, RecordId, RecordSnapshot};
use crate::remote::RemoteStore;
use crate::schema::RecordSchema;
use crate::session::EditSession;

use pending::{PendingWrites, WriteGuard};

struct ControllerInner {
    cache: RecordCache,
    store: Arc<dyn RemoteStore>,
    config: SyncConfig,
    pending: Arc<PendingWrites>,
}

impl ControllerInner {
    async fn write(
        self: Arc<Self>,
        guard: WriteGuard,
        proposed: Arc<RecordSnapshot>,
    ) -> crate::Result<Arc<RecordSnapshot>> {
        let id = guard.id().clone();
        let creating = id.is_provisional(&self.config.provisional_id_prefix);

        let result = if creating {
            self.store.create(proposed.record().to_new_record()).await
        } else {
            self.store
                .merge_update(&id, proposed.record().fields.clone())
                .await
        };

        let elapsed_ms = self
            .pending
            .get(&id)
            .map(|write| write.issued_at.elapsed().as_millis() as u64)
            .unwrap_or_default();

        match result {
            Ok(record) => {
                let confirmed = Arc::new(RecordSnapshot::remote(record));
                tracing::info!(
                    record = %confirmed.id(),
                    provisional = creating,
                    elapsed_ms,
                    "Write committed"
                );
                guard.commit(&id, Arc::clone(&confirmed));
                Ok(confirmed)
            }
            Err(cause) => {
                tracing::warn!(record = %id, elapsed_ms, "Write failed, rolling back: {}", cause);
                guard.rollback();
                Err(SyncError::WriteFailed { id, cause })
            }
        }
    }
}

/// Coordinates saves so each is atomic from the consumer's point of view.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct OptimisticController {
    inner: Arc<ControllerInner>,
}

impl OptimisticController {
    /// Creates a controller over `cache` writing to `store`.
    pub fn new(cache: RecordCache, store: Arc<dyn RemoteStore>) -> Self {
        Self::with_config(cache, store, SyncConfig::default())
    }

    pub fn with_config(cache: RecordCache, store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                cache,
                store,
                config,
                pending: Arc::new(PendingWrites::default()),
            }),
        }
    }

    pub fn cache(&self) -> &RecordCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Starts editing the cached version of `id`.
    ///
    /// # Errors
    /// `NotFound` if the cache holds no snapshot for `id`.
    pub fn begin_edit(&self, id: &RecordId, schema: Arc<RecordSchema>) -> crate::Result<EditSession> {
        let base = self
            .inner
            .cache
            .get(id)
            .ok_or_else(|| SyncError::NotFound { id: id.clone() })?;
        Ok(EditSession::begin_with_config(base, schema, &self.inner.config))
    }

    /// Starts editing a record the store has not created yet.
    ///
    /// The draft gets a provisional id; saving it issues a create.
    pub fn begin_draft(&self, schema: Arc<RecordSchema>, initial: Document) -> EditSession {
        let id = RecordId::provisional(&self.inner.config.provisional_id_prefix);
        let record = Record::new(id, schema.collection.clone(), initial);
        let base = Arc::new(RecordSnapshot::optimistic(record));
        EditSession::begin_with_config(base, schema, &self.inner.config)
    }

    /// Saves `record` optimistically.
    ///
    /// Before returning, the proposed record is in the cache and every
    /// subscriber has seen it. The store write runs as a Tokio task, so it
    /// completes and reconciles the cache even if the returned `PendingSave`
    /// is dropped.
    ///
    /// # Errors
    /// `Conflict` if a save for the same id has not resolved yet, `NoRuntime`
    /// when called outside a Tokio runtime. No store write is issued and the
    /// cache is untouched in either case.
    pub fn save(&self, record: Record) -> crate::Result<PendingSave> {
        let runtime = Handle::try_current().map_err(|e| SyncError::NoRuntime(e.to_string()))?;
        let id = record.id.clone();
        let proposed = Arc::new(RecordSnapshot::optimistic(record));

        self.inner
            .pending
            .register(&self.inner.cache, &id, Arc::clone(&proposed))?;
        // Rolls back if the publish below panics or the task never runs
        let guard = WriteGuard::new(
            self.inner.cache.clone(),
            Arc::clone(&self.inner.pending),
            id.clone(),
        );
        self.inner.cache.put(&id, Arc::clone(&proposed));
        tracing::debug!(record = %id, "Issuing optimistic write");

        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move { inner.write(guard, proposed).await });
        Ok(PendingSave { id, handle })
    }

    /// Saves an edit session and waits for the outcome.
    ///
    /// The session is discarded once the store confirms the write. On any
    /// failure it stays open so the caller can retry or discard it.
    pub async fn save_session(&self, session: &mut EditSession) -> crate::Result<Arc<RecordSnapshot>> {
        let record = session.to_record()?;
        let confirmed = self.save(record)?.await?;
        session.discard();
        Ok(confirmed)
    }

    /// Returns whether a write for `id` is in flight.
    pub fn is_saving(&self, id: &RecordId) -> bool {
        self.inner.pending.contains(id)
    }

    /// Value being written for `id`, if a write is in flight.
    pub fn pending_value(&self, id: &RecordId) -> Option<Arc<RecordSnapshot>> {
        self.inner.pending.get(id).map(|write| write.proposed)
    }

    /// Number of writes in flight across all records.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }
}

impl std::fmt::Debug for OptimisticController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticController")
            .field("cache", &self.inner.cache)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// An issued save. Resolves to the store-confirmed snapshot.
///
/// Dropping it does not cancel the write.
#[derive(Debug)]
pub struct PendingSave {
    id: RecordId,
    handle: JoinHandle<crate::Result<Arc<RecordSnapshot>>>,
}

impl PendingSave {
    /// Id the save was issued under (provisional for creates).
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingSave {
    type Output = crate::Result<Arc<RecordSnapshot>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => {
                Poll::Ready(Err(SyncError::TaskFailed(join_error.to_string())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
