//! Inspect command implementation.

use serde::Serialize;
use stashdb_core::StorageClient;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database name.
    pub database: String,
    /// Whether the primary engine is serving.
    pub available: bool,
    /// Current database version.
    pub version: u64,
    /// Store used when none is named.
    pub default_store: String,
    /// Per-store statistics.
    pub stores: Vec<StoreStats>,
}

/// Statistics for a single store.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    /// Store name.
    pub name: String,
    /// Number of records.
    pub record_count: usize,
}

/// Runs the inspect command.
pub fn run(client: &StorageClient, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stores: Vec<StoreStats> = client
        .list_stores()
        .into_iter()
        .map(|name| StoreStats {
            record_count: client.count(Some(&name)),
            name,
        })
        .collect();

    let result = InspectResult {
        database: client.database_name().to_string(),
        available: client.is_available(),
        version: client.database_version(),
        default_store: client.default_store(),
        stores,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Database:      {}", result.database);
            println!(
                "Mode:          {}",
                if result.available {
                    "primary"
                } else {
                    "degraded (fallback)"
                }
            );
            println!("Version:       {}", result.version);
            println!("Default store: {}", result.default_store);
            println!("Stores:        {}", result.stores.len());
            for store in &result.stores {
                println!("  {:<24} {} records", store.name, store.record_count);
            }
        }
    }

    Ok(())
}
