//! Loading initial documents into a `MemoryStore`.
//!
//! A seed is a JSON object mapping collection names to arrays of documents,
//! each carrying a string `id`:
//!
//! ```json
//! { "clients": [ { "id": "client001", "profile": { "firstName": "Jane" } } ] }
//! ```

use std::path::Path;

use casebook_core::Record;
use serde_json::Value;
use thiserror::Error;

use crate::memory::MemoryStore;

/// Seed loading errors.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Top level is not an object of arrays
    #[error("Invalid seed layout: {0}")]
    Layout(String),

    /// Document without a string `id`
    #[error("Document {index} in collection '{collection}' has no string id")]
    MissingId { collection: String, index: usize },
}

impl MemoryStore {
    /// Inserts every document of `seed` and returns how many were loaded.
    ///
    /// Nothing is inserted if any document is malformed.
    pub fn load_seed(&self, seed: Value) -> Result<usize, SeedError> {
        let Value::Object(collections) = seed else {
            return Err(SeedError::Layout("expected an object of collections".to_string()));
        };

        let mut records = Vec::new();
        for (collection, documents) in collections {
            let Value::Array(documents) = documents else {
                return Err(SeedError::Layout(format!(
                    "collection '{collection}' is not an array"
                )));
            };
            for (index, document) in documents.into_iter().enumerate() {
                let record = Record::from_document(collection.as_str(), document).ok_or_else(|| {
                    SeedError::MissingId {
                        collection: collection.clone(),
                        index,
                    }
                })?;
                records.push(record);
            }
        }

        let loaded = records.len();
        for record in records {
            self.insert(record);
        }
        tracing::info!("Loaded {} seed documents", loaded);
        Ok(loaded)
    }

    /// Reads a seed file and loads it with [`MemoryStore::load_seed`].
    pub fn load_seed_file(&self, path: impl AsRef<Path>) -> Result<usize, SeedError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let seed: Value = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "Read seed file");
        self.load_seed(seed)
    }
}
