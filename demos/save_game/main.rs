//! Save-game demo
//!
//! Drives the stashdb client the way an embedding host would:
//! - Saving and loading player records in the default store
//! - Adding a store through a schema upgrade
//! - Enumerating keys and stores
//!
//! Data persists under ./save_game_data; run twice to see records survive.
//!
//! Run with: cargo run -p save_game

use stashdb_core::{Config, StorageClient};
use stashdb_storage::{FileEngine, FileSlot};
use std::sync::Arc;

fn main() {
    let root = std::path::Path::new("save_game_data");
    let client = StorageClient::new(
        Arc::new(FileEngine::new(root)),
        Box::new(FileSlot::new(root.join("fallback.json"))),
        Config::new().database_name("adventure"),
    );

    println!(
        "database {:?} open ({} mode, version {})",
        client.database_name(),
        if client.is_available() {
            "primary"
        } else {
            "degraded"
        },
        client.database_version()
    );

    let previous = client.get(None, "player");
    if previous.is_empty() {
        println!("no save found, starting fresh");
    } else {
        println!("previous save: {previous}");
    }

    client.put(None, "player", "{\"name\":\"Robin\",\"hp\":17,\"level\":4}");
    client.put(None, "checkpoint", "forest-3");

    // Schema change: a dedicated store for high scores.
    client.create_store("scores", "{\"keyPath\": \"id\"}");
    client.put(Some("scores"), "robin", "1250");
    client.put(Some("scores"), "ash", "990");

    println!("stores: {:?}", client.list_stores());
    println!(
        "keys in default: {:?} ({} records)",
        client.list_keys(None),
        client.count(None)
    );
    println!(
        "keys in scores: {:?} ({} records)",
        client.list_keys(Some("scores")),
        client.count(Some("scores"))
    );

    println!("loaded player: {}", client.get(None, "player"));
    println!("database version is now {}", client.database_version());
}
