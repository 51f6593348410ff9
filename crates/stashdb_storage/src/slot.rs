//! Single-slot fallback surface.
//!
//! When the primary engine is unavailable, the whole database is emulated
//! through one serialized blob stored in a single well-known slot. Slots do
//! not interpret the blob; the core owns its layout.

use crate::error::EngineResult;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single global slot holding one opaque string blob.
pub trait FallbackSlot: Send + Sync {
    /// Loads the blob, if one has been stored.
    fn load(&self) -> EngineResult<Option<String>>;

    /// Stores the blob, replacing any previous content.
    fn store(&self, blob: &str) -> EngineResult<()>;

    /// Removes the blob.
    fn clear(&self) -> EngineResult<()>;
}

/// An in-memory slot.
#[derive(Debug, Default)]
pub struct MemorySlot {
    blob: RwLock<Option<String>>,
}

impl MemorySlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FallbackSlot for MemorySlot {
    fn load(&self) -> EngineResult<Option<String>> {
        Ok(self.blob.read().clone())
    }

    fn store(&self, blob: &str) -> EngineResult<()> {
        *self.blob.write() = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        *self.blob.write() = None;
        Ok(())
    }
}

/// A slot persisted as a single file, written atomically.
#[derive(Debug)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    /// Creates a slot backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the slot's file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FallbackSlot for FileSlot {
    fn load(&self) -> EngineResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn store(&self, blob: &str) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("tmp");
        let mut file = File::create(&temp)?;
        file.write_all(blob.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_slot_roundtrip() {
        let slot = MemorySlot::new();
        assert_eq!(slot.load().unwrap(), None);

        slot.store("{\"stores\":{}}").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("{\"stores\":{}}"));

        slot.clear().unwrap();
        assert_eq!(slot.load().unwrap(), None);
    }

    #[test]
    fn file_slot_roundtrip() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("fallback.json"));

        assert_eq!(slot.load().unwrap(), None);

        slot.store("blob-1").unwrap();
        slot.store("blob-2").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("blob-2"));

        slot.clear().unwrap();
        assert_eq!(slot.load().unwrap(), None);
        slot.clear().unwrap();
    }

    #[test]
    fn file_slot_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("deep").join("fallback.json"));

        slot.store("blob").unwrap();
        assert_eq!(slot.load().unwrap().as_deref(), Some("blob"));
    }

    #[test]
    fn file_slot_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallback.json");

        FileSlot::new(&path).store("kept").unwrap();
        assert_eq!(FileSlot::new(&path).load().unwrap().as_deref(), Some("kept"));
    }
}
