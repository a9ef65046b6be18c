use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Seed file (JSON object of collection name to documents)
    #[arg(long, global = true)]
    pub seed: Option<PathBuf>,

    /// Simulated store latency in milliseconds
    #[arg(long, global = true, default_value_t = 0)]
    pub latency_ms: u64,

    /// Do not stamp createdAt/updatedAt on writes
    #[arg(long, global = true)]
    pub no_server_timestamps: bool,

    /// Accept any value for a known field
    #[arg(long, global = true)]
    pub lenient: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the field paths and kinds of a built-in schema
    Schema {
        /// Schema name (client, isp, task, case_note, workshop)
        name: String,
    },

    /// Fetch a record and print it as JSON
    Show {
        /// Record id
        id: String,
    },

    /// Edit a record and save it optimistically
    Edit {
        /// Record id
        id: String,

        /// Schema the edits are checked against; defaults to the schema
        /// of the record's collection
        #[arg(long)]
        schema: Option<String>,

        /// Field assignment as path=value; the value is parsed as JSON,
        /// falling back to a plain string
        #[arg(long = "set", value_name = "PATH=VALUE", required = true)]
        sets: Vec<String>,

        /// Make the store reject the write with this reason
        #[arg(long)]
        reject: Option<String>,
    },
}
