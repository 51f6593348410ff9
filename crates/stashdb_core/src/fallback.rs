//! Degraded-mode store over a single-slot snapshot.
//!
//! When the primary engine is unavailable, the whole database is emulated
//! by one JSON blob: `{"stores": {store: {key: value}}, "metadata":
//! {"defaultStore": name}}`. The blob is created lazily on first use and
//! fully rewritten on every mutation; there is no partial update.

use crate::error::CoreResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use stashdb_storage::FallbackSlot;
use std::collections::BTreeMap;
use tracing::warn;

/// Snapshot metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Store used when operations do not name one.
    #[serde(rename = "defaultStore")]
    pub default_store: String,
}

/// The serialized structure mirroring the store/record model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Records per store.
    pub stores: BTreeMap<String, BTreeMap<String, String>>,
    /// Snapshot metadata.
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Creates an empty snapshot seeded with the default store.
    #[must_use]
    pub fn empty(default_store: &str) -> Self {
        let mut stores = BTreeMap::new();
        stores.insert(default_store.to_string(), BTreeMap::new());
        Self {
            stores,
            metadata: SnapshotMetadata {
                default_store: default_store.to_string(),
            },
        }
    }
}

/// Store operations served from the fallback snapshot.
///
/// Every mutating operation is a whole-blob read-modify-write; there is no
/// atomicity against concurrent fallback writers. Slot failures and
/// unreadable blobs are absorbed with a warning, matching the facade's
/// never-raise contract.
pub struct FallbackStore {
    slot: Box<dyn FallbackSlot>,
    default_store: RwLock<String>,
}

impl FallbackStore {
    /// Creates a store over the given slot.
    pub fn new(slot: Box<dyn FallbackSlot>, default_store: impl Into<String>) -> Self {
        Self {
            slot,
            default_store: RwLock::new(default_store.into()),
        }
    }

    fn load_snapshot(&self) -> CoreResult<Option<Snapshot>> {
        match self.slot.load()? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> CoreResult<()> {
        let blob = serde_json::to_string(snapshot)?;
        self.slot.store(&blob)?;
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        match self.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => Snapshot::empty(&self.default_store.read()),
            Err(e) => {
                warn!(error = %e, "fallback snapshot unreadable, starting empty");
                Snapshot::empty(&self.default_store.read())
            }
        }
    }

    fn persist(&self, snapshot: &Snapshot) {
        if let Err(e) = self.save_snapshot(snapshot) {
            warn!(error = %e, "fallback snapshot write failed");
        }
    }

    /// Reads a record; empty string if absent.
    pub fn get(&self, store: &str, key: &str) -> String {
        self.snapshot()
            .stores
            .get(store)
            .and_then(|s| s.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Writes a record, creating the store mapping if absent.
    pub fn put(&self, store: &str, key: &str, value: &str) {
        let mut snapshot = self.snapshot();
        snapshot
            .stores
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.persist(&snapshot);
    }

    /// Removes a record; no-op if absent.
    pub fn delete(&self, store: &str, key: &str) {
        let mut snapshot = self.snapshot();
        let removed = snapshot
            .stores
            .get_mut(store)
            .is_some_and(|s| s.remove(key).is_some());
        if removed {
            self.persist(&snapshot);
        }
    }

    /// Returns all keys in the store, in stable order.
    pub fn keys(&self, store: &str) -> Vec<String> {
        self.snapshot()
            .stores
            .get(store)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of records in the store.
    pub fn count(&self, store: &str) -> usize {
        self.snapshot()
            .stores
            .get(store)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Empties the store without removing it.
    pub fn clear(&self, store: &str) {
        let mut snapshot = self.snapshot();
        let cleared = snapshot.stores.get_mut(store).is_some_and(|s| {
            let had_records = !s.is_empty();
            s.clear();
            had_records
        });
        if cleared {
            self.persist(&snapshot);
        }
    }

    /// Returns the names of all stores, in stable order.
    pub fn store_names(&self) -> Vec<String> {
        self.snapshot().stores.keys().cloned().collect()
    }

    /// Creates a store mapping if absent.
    pub fn create_store(&self, name: &str) {
        let mut snapshot = self.snapshot();
        snapshot.stores.entry(name.to_string()).or_default();
        self.persist(&snapshot);
    }

    /// Removes a store mapping and its records.
    pub fn delete_store(&self, name: &str) {
        let mut snapshot = self.snapshot();
        if snapshot.stores.remove(name).is_some() {
            self.persist(&snapshot);
        }
    }

    /// Resets the snapshot to the empty structure.
    pub fn reset(&self) {
        self.persist(&Snapshot::empty(&self.default_store.read()));
    }

    /// Returns the current default store name.
    pub fn default_store(&self) -> String {
        self.default_store.read().clone()
    }

    /// Changes the default store name, updating snapshot metadata if a
    /// snapshot already exists.
    pub fn set_default_store(&self, name: &str) {
        *self.default_store.write() = name.to_string();
        if let Ok(Some(mut snapshot)) = self.load_snapshot() {
            snapshot.metadata.default_store = name.to_string();
            self.persist(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashdb_storage::MemorySlot;

    fn store() -> FallbackStore {
        FallbackStore::new(Box::new(MemorySlot::new()), "default")
    }

    #[test]
    fn unwritten_key_reads_empty() {
        let fallback = store();
        assert_eq!(fallback.get("default", "never"), "");
        assert_eq!(fallback.get("ghost", "never"), "");
    }

    #[test]
    fn put_then_get_roundtrip() {
        let fallback = store();
        fallback.put("default", "player", "{\"hp\":3}");
        assert_eq!(fallback.get("default", "player"), "{\"hp\":3}");
    }

    #[test]
    fn put_creates_missing_store_mapping() {
        let fallback = store();
        fallback.put("scores", "alice", "10");

        assert_eq!(fallback.get("scores", "alice"), "10");
        assert!(fallback.store_names().contains(&"scores".to_string()));
    }

    #[test]
    fn delete_removes_and_tolerates_absent() {
        let fallback = store();
        fallback.put("default", "k", "v");

        fallback.delete("default", "k");
        assert_eq!(fallback.get("default", "k"), "");

        fallback.delete("default", "k");
        fallback.delete("ghost", "k");
    }

    #[test]
    fn keys_and_count_track_records() {
        let fallback = store();
        fallback.put("default", "b", "2");
        fallback.put("default", "a", "1");

        assert_eq!(fallback.keys("default"), vec!["a", "b"]);
        assert_eq!(fallback.count("default"), 2);
        assert_eq!(fallback.count("ghost"), 0);
        assert!(fallback.keys("ghost").is_empty());
    }

    #[test]
    fn clear_empties_only_the_named_store() {
        let fallback = store();
        fallback.put("default", "k", "v");
        fallback.put("other", "k", "v");

        fallback.clear("default");

        assert_eq!(fallback.count("default"), 0);
        assert_eq!(fallback.count("other"), 1);
    }

    #[test]
    fn create_and_delete_store() {
        let fallback = store();
        fallback.create_store("scores");
        assert!(fallback.store_names().contains(&"scores".to_string()));

        // Creating again keeps existing records.
        fallback.put("scores", "k", "v");
        fallback.create_store("scores");
        assert_eq!(fallback.count("scores"), 1);

        fallback.delete_store("scores");
        assert!(!fallback.store_names().contains(&"scores".to_string()));
    }

    #[test]
    fn reset_restores_empty_structure() {
        let fallback = store();
        fallback.put("default", "k", "v");
        fallback.put("other", "k", "v");

        fallback.reset();

        assert_eq!(fallback.count("default"), 0);
        assert_eq!(fallback.store_names(), vec!["default"]);
    }

    #[test]
    fn snapshot_is_created_lazily() {
        let slot = Box::new(MemorySlot::new());
        let fallback = FallbackStore::new(slot, "default");

        // Reads alone never materialize the blob.
        let _ = fallback.get("default", "k");
        let _ = fallback.keys("default");

        fallback.put("default", "k", "v");
        assert_eq!(fallback.get("default", "k"), "v");
    }

    #[test]
    fn corrupt_blob_treated_as_empty() {
        let slot = MemorySlot::new();
        slot.store("not json").unwrap();
        let fallback = FallbackStore::new(Box::new(slot), "default");

        assert_eq!(fallback.get("default", "k"), "");
        fallback.put("default", "k", "v");
        assert_eq!(fallback.get("default", "k"), "v");
    }

    #[test]
    fn snapshot_layout_uses_default_store_key() {
        let snapshot = Snapshot::empty("default");
        let blob = serde_json::to_string(&snapshot).unwrap();

        assert!(blob.contains("\"stores\""));
        assert!(blob.contains("\"metadata\""));
        assert!(blob.contains("\"defaultStore\":\"default\""));
    }

    proptest::proptest! {
        #[test]
        fn snapshot_json_roundtrip(
            stores in proptest::collection::btree_map(
                "[a-z][a-z0-9_]{0,8}",
                proptest::collection::btree_map("[a-zA-Z0-9]{0,8}", "[ -~]{0,16}", 0..4),
                0..4,
            ),
        ) {
            let snapshot = Snapshot {
                stores,
                metadata: SnapshotMetadata {
                    default_store: "default".to_string(),
                },
            };

            let blob = serde_json::to_string(&snapshot).unwrap();
            let decoded: Snapshot = serde_json::from_str(&blob).unwrap();
            proptest::prop_assert_eq!(decoded, snapshot);
        }
    }

    #[test]
    fn set_default_store_updates_metadata() {
        let fallback = store();
        fallback.put("default", "k", "v");

        fallback.set_default_store("saves");

        assert_eq!(fallback.default_store(), "saves");
        let snapshot = fallback.load_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.metadata.default_store, "saves");
    }
}
