//! Per-record editing buffer staged against a base snapshot.
//!
//! A session never touches the record cache. Edits accumulate in a working
//! copy of the base document; `to_record` hands back a complete record that
//! the controller can save.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::record::{
    get_path, merge_documents, remove_path, set_path, Document, Record, RecordId, RecordSnapshot,
};
use crate::schema::RecordSchema;

/// Mutable working copy of one record.
#[derive(Debug)]
pub struct EditSession {
    /// Snapshot the session was begun from (read-only)
    base: Arc<RecordSnapshot>,
    /// Schema that field paths are checked against
    schema: Arc<RecordSchema>,
    /// Base fields with edits applied
    working: Document,
    /// Paths touched through `set_field`
    touched: BTreeSet<String>,
    strict_types: bool,
    closed: bool,
}

impl EditSession {
    /// Begins a session with the default configuration.
    pub fn begin(base: Arc<RecordSnapshot>, schema: Arc<RecordSchema>) -> Self {
        Self::begin_with_config(base, schema, &SyncConfig::default())
    }

    /// Begins a session, capturing the snapshot's fields as working values.
    pub fn begin_with_config(
        base: Arc<RecordSnapshot>,
        schema: Arc<RecordSchema>,
        config: &SyncConfig,
    ) -> Self {
        let working = base.record().fields.clone();
        Self {
            base,
            schema,
            working,
            touched: BTreeSet::new(),
            strict_types: config.strict_field_types,
            closed: false,
        }
    }

    /// Id of the record being edited.
    pub fn id(&self) -> &RecordId {
        self.base.id()
    }

    pub fn base(&self) -> &Arc<RecordSnapshot> {
        &self.base
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Overwrites one field in the working copy.
    ///
    /// An object value is merged into the object already at `path`, so
    /// nested fields it leaves out keep their current values.
    ///
    /// # Errors
    /// `SessionClosed` after `discard`, `InvalidField` for a path the schema
    /// does not define, `FieldTypeMismatch` when strict typing is on and the
    /// value does not fit the field.
    pub fn set_field(&mut self, path: &str, value: Value) -> Result<(), SyncError> {
        self.ensure_open()?;
        if self.strict_types {
            self.schema.check_value(path, &value)?;
        } else {
            self.schema.resolve(path)?;
        }
        let value = match (value, get_path(&self.working, path)) {
            (Value::Object(incoming), Some(Value::Object(existing))) => {
                let mut merged = existing.clone();
                merge_documents(&mut merged, &incoming);
                Value::Object(merged)
            }
            (value, _) => value,
        };
        set_path(&mut self.working, path, value);
        self.touched.insert(path.to_string());
        Ok(())
    }

    /// Reads the working value at `path`.
    pub fn get_field(&self, path: &str) -> Result<Option<&Value>, SyncError> {
        self.ensure_open()?;
        self.schema.resolve(path)?;
        Ok(get_path(&self.working, path))
    }

    /// Reverts `path` (and anything beneath it) to the base value.
    pub fn reset_field(&mut self, path: &str) -> Result<(), SyncError> {
        self.ensure_open()?;
        self.schema.resolve(path)?;
        match get_path(&self.base.record().fields, path) {
            Some(original) => set_path(&mut self.working, path, original.clone()),
            None => {
                remove_path(&mut self.working, path);
            }
        }
        let nested = format!("{}.", path);
        self.touched
            .retain(|p| p != path && !p.starts_with(&nested));
        Ok(())
    }

    /// Paths whose working value differs from the base.
    pub fn changed_fields(&self) -> Result<Vec<String>, SyncError> {
        self.ensure_open()?;
        let base = &self.base.record().fields;
        Ok(self
            .touched
            .iter()
            .filter(|p| get_path(&self.working, p) != get_path(base, p))
            .cloned()
            .collect())
    }

    /// Returns whether the working copy differs from the base.
    pub fn is_dirty(&self) -> bool {
        !self.closed && self.working != self.base.record().fields
    }

    /// Produces the complete record: base fields with edits applied.
    pub fn to_record(&self) -> Result<Record, SyncError> {
        self.ensure_open()?;
        let base = self.base.record();
        let edited = Record::new(base.id.clone(), base.collection.clone(), self.working.clone());
        Ok(edited.merged_over(base))
    }

    /// Releases the session; later edits and reads fail with `SessionClosed`.
    pub fn discard(&mut self) {
        if self.closed {
            return;
        }
        if self.is_dirty() {
            tracing::debug!("Discarding unsaved edits for record {}", self.id());
        }
        self.closed = true;
        self.working.clear();
        self.touched.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.closed {
            Err(SyncError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.discard();
    }
}
