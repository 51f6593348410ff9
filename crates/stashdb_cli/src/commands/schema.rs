//! Schema-changing commands.

use stashdb_core::StorageClient;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Prints all store names as a JSON array.
pub fn stores(client: &StorageClient) -> CommandResult {
    println!("{}", serde_json::to_string(&client.list_stores())?);
    Ok(())
}

/// Creates a store from an options fragment.
pub fn create_store(client: &StorageClient, name: &str, options: &str) -> CommandResult {
    client.create_store(name, options);
    println!(
        "store {:?} ready (database version {})",
        name,
        client.database_version()
    );
    Ok(())
}

/// Deletes a store and its records.
pub fn delete_store(client: &StorageClient, name: &str) -> CommandResult {
    client.delete_store(name);
    println!(
        "store {:?} removed (database version {})",
        name,
        client.database_version()
    );
    Ok(())
}

/// Deletes the entire database and re-initializes it empty.
pub fn wipe(client: &StorageClient) -> CommandResult {
    client.wipe_database();
    println!("database {:?} wiped", client.database_name());
    Ok(())
}
