//! CLI for inspecting record schemas and exercising optimistic saves.
//!
//! Runs against an in-memory store seeded from a JSON file (or a small
//! built-in data set), so the whole save path can be observed locally:
//! - `schema` lists the fields a schema accepts
//! - `show` fetches a record through the cache
//! - `edit` applies field edits and saves them, optionally forcing a rejection

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::Sandbox;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so record JSON on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Schema { name } => commands::schema(name),
        Commands::Show { id } => {
            let sandbox = Sandbox::open(&cli)?;
            commands::show(&sandbox, id).await
        }
        Commands::Edit {
            id,
            schema,
            sets,
            reject,
        } => {
            let sandbox = Sandbox::open(&cli)?;
            commands::edit(&sandbox, id, schema.as_deref(), sets, reject.as_deref()).await
        }
    }
}
