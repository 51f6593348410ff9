//! stashdb CLI
//!
//! Command-line tools for stashdb databases.
//!
//! # Commands
//!
//! - `get` / `put` / `delete` - Record operations against a store
//! - `keys` / `count` / `clear` - Store-level record queries
//! - `stores` / `create-store` / `delete-store` - Schema changes
//! - `wipe` - Delete and re-initialize the database
//! - `inspect` - Display database state and per-store statistics

mod commands;

use clap::{Parser, Subcommand};
use stashdb_core::{Config, StorageClient};
use stashdb_storage::{FileEngine, FileSlot};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// stashdb command-line database tools.
#[derive(Parser)]
#[command(name = "stashdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine root directory
    #[arg(global = true, long, default_value = "stashdb_data")]
    root: PathBuf,

    /// Database name
    #[arg(global = true, short, long, default_value = "stashdb")]
    database: String,

    /// Store to operate on (defaults to the database default store)
    #[arg(global = true, short, long)]
    store: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the value stored under a key
    Get {
        /// Record key
        key: String,
    },

    /// Write a value under a key
    Put {
        /// Record key
        key: String,
        /// Record value
        value: String,
    },

    /// Delete the record under a key
    Delete {
        /// Record key
        key: String,
    },

    /// List all keys in the store as a JSON array
    Keys,

    /// Count records in the store
    Count,

    /// Remove every record in the store
    Clear,

    /// List all stores as a JSON array
    Stores,

    /// Create a store, raising the database version
    CreateStore {
        /// Store name
        name: String,

        /// Creation options as a JSON fragment, e.g. '{"keyPath": "id"}'
        #[arg(short, long, default_value = "")]
        options: String,
    },

    /// Delete a store and its records, raising the database version
    DeleteStore {
        /// Store name
        name: String,
    },

    /// Delete the entire database and re-initialize it empty
    Wipe,

    /// Display database state and per-store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("stashdb CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("stashdb Core v{}", stashdb_core::VERSION);
        return Ok(());
    }

    let engine = Arc::new(FileEngine::new(&cli.root));
    let slot = Box::new(FileSlot::new(cli.root.join("fallback.json")));
    let config = Config::new().database_name(cli.database.clone());
    let client = StorageClient::new(engine, slot, config);
    debug!(root = %cli.root.display(), database = %cli.database, available = client.is_available(), "client ready");
    let store = cli.store.as_deref();

    match cli.command {
        Commands::Get { key } => commands::kv::get(&client, store, &key)?,
        Commands::Put { key, value } => commands::kv::put(&client, store, &key, &value)?,
        Commands::Delete { key } => commands::kv::delete(&client, store, &key)?,
        Commands::Keys => commands::kv::keys(&client, store)?,
        Commands::Count => commands::kv::count(&client, store)?,
        Commands::Clear => commands::kv::clear(&client, store)?,
        Commands::Stores => commands::schema::stores(&client)?,
        Commands::CreateStore { name, options } => {
            commands::schema::create_store(&client, &name, &options)?;
        }
        Commands::DeleteStore { name } => commands::schema::delete_store(&client, &name)?,
        Commands::Wipe => commands::schema::wipe(&client)?,
        Commands::Inspect { format } => commands::inspect::run(&client, &format)?,
        Commands::Version => unreachable!("handled above"),
    }

    Ok(())
}
