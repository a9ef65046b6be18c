//! Memory store configuration.

/// Memory store configuration.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Delay applied to every fetch and write, in milliseconds
    pub latency_ms: u64,
    /// Field stamped with the write time on create and update (`None` disables)
    pub updated_at_field: Option<String>,
    /// Field stamped with the creation time on create (`None` disables)
    pub created_at_field: Option<String>,
    /// Prefix for sequential ids assigned on create; random ids when `None`
    pub id_prefix: Option<String>,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            updated_at_field: Some("updatedAt".to_string()),
            created_at_field: Some("createdAt".to_string()),
            id_prefix: None,
        }
    }
}

impl MemoryStoreConfig {
    /// Disables both server timestamp fields.
    pub fn without_timestamps(mut self) -> Self {
        self.updated_at_field = None;
        self.created_at_field = None;
        self
    }
}
