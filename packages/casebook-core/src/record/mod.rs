//! Record identity, documents, and immutable snapshots.

mod path;
mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use path::{get_path, merge_documents, remove_path, set_path};
pub use snapshot::{RecordSnapshot, SnapshotOrigin};

/// Field map of a stored document.
pub type Document = serde_json::Map<String, Value>;

/// Stable identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a local id for a record the store has not created yet.
    pub fn provisional(prefix: &str) -> Self {
        Self(format!("{}{}", prefix, uuid::Uuid::new_v4()))
    }

    /// Returns whether this id was minted with the given provisional prefix.
    pub fn is_provisional(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A persisted document: id, owning collection, and fields.
///
/// The id never changes once the store has created the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub collection: String,
    pub fields: Document,
}

impl Record {
    /// Creates a record from its parts.
    pub fn new(id: impl Into<RecordId>, collection: impl Into<String>, fields: Document) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            fields,
        }
    }

    /// Builds a record from a JSON document carrying an `id` key.
    ///
    /// Returns `None` if the value is not an object or has no string id.
    pub fn from_document(collection: impl Into<String>, document: Value) -> Option<Self> {
        let Value::Object(mut fields) = document else {
            return None;
        };
        let id = match fields.remove("id") {
            Some(Value::String(id)) => id,
            _ => return None,
        };
        Some(Self::new(id, collection, fields))
    }

    /// Renders the record as a single JSON document with an `id` key.
    pub fn to_document(&self) -> Value {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.to_string()));
        Value::Object(fields)
    }

    /// Reads a field by dotted path.
    pub fn field(&self, path: &str) -> Option<&Value> {
        get_path(&self.fields, path)
    }

    /// Returns this record's fields merged over `base`, keeping this id.
    ///
    /// Nested objects merge key by key; every other value replaces.
    pub fn merged_over(&self, base: &Record) -> Record {
        let mut fields = base.fields.clone();
        merge_documents(&mut fields, &self.fields);
        Record {
            id: self.id.clone(),
            collection: self.collection.clone(),
            fields,
        }
    }

    /// Strips the id for a create request.
    pub fn to_new_record(&self) -> NewRecord {
        NewRecord {
            collection: self.collection.clone(),
            fields: self.fields.clone(),
        }
    }
}

/// A document not yet assigned an id by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub collection: String,
    pub fields: Document,
}

impl NewRecord {
    pub fn new(collection: impl Into<String>, fields: Document) -> Self {
        Self {
            collection: collection.into(),
            fields,
        }
    }

    /// Attaches the id assigned by the store.
    pub fn with_id(self, id: impl Into<RecordId>) -> Record {
        Record::new(id, self.collection, self.fields)
    }
}
