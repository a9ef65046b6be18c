//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use casebook_core::schema::catalog;
use casebook_core::{
    OptimisticController, RecordCache, RecordId, RecordLoader, RecordSchema, StoreError, SyncConfig,
    SyncError,
};
use casebook_store::{MemoryStore, MemoryStoreConfig};
use serde_json::{json, Value};

use crate::cli::Cli;

/// Store, cache and controller wired together for one invocation.
pub struct Sandbox {
    pub store: MemoryStore,
    pub cache: RecordCache,
    pub controller: OptimisticController,
    pub loader: RecordLoader,
}

impl Sandbox {
    /// Builds the store from the command-line options and loads the seed.
    pub fn open(cli: &Cli) -> Result<Self> {
        let mut store_config = MemoryStoreConfig {
            latency_ms: cli.latency_ms,
            ..Default::default()
        };
        if cli.no_server_timestamps {
            store_config = store_config.without_timestamps();
        }
        let store = MemoryStore::with_config(store_config);

        let loaded = match &cli.seed {
            Some(path) => store
                .load_seed_file(path)
                .with_context(|| format!("Failed to load seed {}", path.display()))?,
            None => store.load_seed(demo_seed())?,
        };
        tracing::debug!("Store ready with {} documents", loaded);

        let sync_config = SyncConfig {
            strict_field_types: !cli.lenient,
            ..Default::default()
        };
        let cache = RecordCache::new();
        let controller =
            OptimisticController::with_config(cache.clone(), Arc::new(store.clone()), sync_config);
        let loader = RecordLoader::new(cache.clone(), Arc::new(store.clone()));

        Ok(Self {
            store,
            cache,
            controller,
            loader,
        })
    }
}

/// Documents used when no seed file is given.
pub fn demo_seed() -> Value {
    json!({
        "clients": [
            {
                "id": "client001",
                "profile": {"firstName": "Jane", "lastName": "Doe", "dob": "1990-04-02", "age": 34},
                "referralSource": "Self",
                "auditChecklist": [],
                "metadata": {
                    "createdBy": "admin01",
                    "lastModifiedBy": "admin01",
                    "clientType": "General Population",
                    "status": "Prospect",
                    "assignedAdminId": "admin01",
                    "assignedAdminName": "Ada Admin"
                }
            }
        ],
        "tasks": [
            {
                "id": "task001",
                "clientId": "client001",
                "title": "Collect proof of income",
                "status": "Pending"
            }
        ]
    })
}

/// Parses `path=value`; the value is JSON if it parses, a string otherwise.
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (path, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected PATH=VALUE, got '{}'", assignment))?;
    let path = path.trim();
    if path.is_empty() {
        bail!("Empty field path in '{}'", assignment);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((path.to_string(), value))
}

/// Picks the named schema, or the one owning `collection` when no name is given.
pub fn resolve_schema(name: Option<&str>, collection: &str) -> Result<RecordSchema> {
    match name {
        Some(name) => catalog::by_name(name).ok_or_else(|| anyhow!("Unknown schema '{}'", name)),
        None => catalog::for_collection(collection)
            .ok_or_else(|| anyhow!("No schema for collection '{}'; pass --schema", collection)),
    }
}

pub fn schema(name: &str) -> Result<()> {
    let schema = catalog::by_name(name).ok_or_else(|| {
        let known: Vec<String> = catalog::all().into_iter().map(|s| s.name).collect();
        anyhow!("Unknown schema '{}' (known: {})", name, known.join(", "))
    })?;

    println!("{} (collection: {})", schema.name, schema.collection);
    for (path, kind) in schema.field_paths() {
        println!("  {:<40} {}", path, kind.name());
    }
    Ok(())
}

pub async fn show(sandbox: &Sandbox, id: &str) -> Result<()> {
    let snapshot = sandbox.loader.fetch(&RecordId::new(id)).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot.record().to_document())?);
    Ok(())
}

pub async fn edit(
    sandbox: &Sandbox,
    id: &str,
    schema_name: Option<&str>,
    sets: &[String],
    reject: Option<&str>,
) -> Result<()> {
    let id = RecordId::new(id);
    let loaded = sandbox.loader.fetch(&id).await?;
    let schema = resolve_schema(schema_name, &loaded.record().collection)?;

    let _updates = sandbox.cache.subscribe(&id, |value| match value {
        Some(snapshot) => tracing::info!(
            record = %snapshot.id(),
            origin = ?snapshot.origin(),
            captured_at = %snapshot.captured_at(),
            "Cache updated"
        ),
        None => tracing::info!("Cache entry removed"),
    });

    let mut edit = sandbox.controller.begin_edit(&id, Arc::new(schema))?;
    for assignment in sets {
        let (path, value) = parse_assignment(assignment)?;
        edit.set_field(&path, value)
            .with_context(|| format!("Cannot set '{}'", path))?;
    }
    tracing::info!(changed = ?edit.changed_fields()?, "Saving edits");

    if let Some(reason) = reject {
        sandbox
            .store
            .fail_next_write(StoreError::Rejected(reason.to_string()));
    }

    match sandbox.controller.save_session(&mut edit).await {
        Ok(confirmed) => {
            println!("{}", serde_json::to_string_pretty(&confirmed.record().to_document())?);
            Ok(())
        }
        Err(e @ SyncError::WriteFailed { .. }) => {
            eprintln!("Save rolled back: {}", e);
            if let Some(current) = sandbox.cache.get(&id) {
                println!("{}", serde_json::to_string_pretty(&current.record().to_document())?);
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
