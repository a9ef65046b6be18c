//! Synchronization configuration.

/// Configuration shared by edit sessions and the write controller.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Prefix marking ids minted locally for records not yet created
    pub provisional_id_prefix: String,
    /// Check `set_field` values against the declared field kind
    pub strict_field_types: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            provisional_id_prefix: "draft-".to_string(),
            strict_field_types: true,
        }
    }
}
