use chrono::{DateTime, Utc};

use super::{Record, RecordId};

/// Where the value held by a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Confirmed by the store (read, push, or write result)
    Remote,
    /// Applied locally ahead of store confirmation
    Optimistic,
}

/// Immutable point-in-time copy of a record.
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    record: Record,
    origin: SnapshotOrigin,
    captured_at: DateTime<Utc>,
}

impl RecordSnapshot {
    pub fn new(record: Record, origin: SnapshotOrigin) -> Self {
        Self {
            record,
            origin,
            captured_at: Utc::now(),
        }
    }

    /// Snapshot of a value confirmed by the store.
    pub fn remote(record: Record) -> Self {
        Self::new(record, SnapshotOrigin::Remote)
    }

    /// Snapshot of a value not yet confirmed by the store.
    pub fn optimistic(record: Record) -> Self {
        Self::new(record, SnapshotOrigin::Optimistic)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn id(&self) -> &RecordId {
        &self.record.id
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn is_optimistic(&self) -> bool {
        self.origin == SnapshotOrigin::Optimistic
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Compares record content, ignoring origin and capture time.
    pub fn same_record(&self, other: &RecordSnapshot) -> bool {
        self.record == other.record
    }
}
