//! Client-side record synchronization for case-management documents.
//!
//! Provides the record cache, schema-checked edit sessions, the optimistic
//! update controller with rollback, and the traits a document store must
//! implement to back them.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod record;
pub mod remote;
pub mod schema;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{RecordCache, Subscription};
pub use config::SyncConfig;
pub use controller::{OptimisticController, PendingSave};
pub use error::{StoreError, SyncError};
pub use loader::{LiveView, RecordLoader};
pub use record::{Document, NewRecord, Record, RecordId, RecordSnapshot, SnapshotOrigin};
pub use remote::{ListenerHandle, PushSource, RemoteStore};
pub use schema::{FieldDef, FieldKind, RecordSchema};
pub use session::EditSession;

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
