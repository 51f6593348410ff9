//! Record-level commands.

use stashdb_core::StorageClient;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Prints the value stored under `key` (empty line if absent).
pub fn get(client: &StorageClient, store: Option<&str>, key: &str) -> CommandResult {
    println!("{}", client.get(store, key));
    Ok(())
}

/// Writes `value` under `key`.
pub fn put(client: &StorageClient, store: Option<&str>, key: &str, value: &str) -> CommandResult {
    client.put(store, key, value);
    Ok(())
}

/// Deletes the record under `key`.
pub fn delete(client: &StorageClient, store: Option<&str>, key: &str) -> CommandResult {
    client.delete(store, key);
    Ok(())
}

/// Prints all keys in the store as a JSON array.
pub fn keys(client: &StorageClient, store: Option<&str>) -> CommandResult {
    println!("{}", serde_json::to_string(&client.list_keys(store))?);
    Ok(())
}

/// Prints the number of records in the store.
pub fn count(client: &StorageClient, store: Option<&str>) -> CommandResult {
    println!("{}", client.count(store));
    Ok(())
}

/// Removes every record in the store.
pub fn clear(client: &StorageClient, store: Option<&str>) -> CommandResult {
    client.clear(store);
    Ok(())
}
