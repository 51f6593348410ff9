//! Database schema: version number and store registry.

use crate::engine::SchemaEditor;
use crate::error::{EngineError, EngineResult};
use std::collections::BTreeMap;

/// Magic bytes for an encoded schema.
pub const SCHEMA_MAGIC: [u8; 4] = *b"SSCH";

/// Current schema encoding version.
pub const SCHEMA_ENCODING_VERSION: u16 = 1;

/// Configuration applied when a store is created.
///
/// Options take effect only at creation time and are recorded in the schema
/// alongside the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Record field used as an implicit key, if any.
    pub key_path: Option<String>,
    /// Whether keys are generated automatically when omitted.
    pub auto_increment: bool,
}

impl StoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key path.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Sets whether keys are auto-generated.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }
}

/// The versioned store registry of a database.
///
/// The schema is the unit of migration: raising [`version`] is the only way
/// to change which stores exist.
///
/// [`version`]: Schema::version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Database version. Monotonically increasing, never reused.
    pub version: u64,
    /// Store registry, keyed by store name.
    pub stores: BTreeMap<String, StoreOptions>,
}

impl Schema {
    /// Creates an empty schema at the given version.
    #[must_use]
    pub fn new(version: u64) -> Self {
        Self {
            version,
            stores: BTreeMap::new(),
        }
    }

    /// Encodes the schema to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&SCHEMA_MAGIC);
        buf.extend_from_slice(&SCHEMA_ENCODING_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.version.to_le_bytes());

        let count = u32::try_from(self.stores.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());

        for (name, options) in &self.stores {
            let name_bytes = name.as_bytes();
            let name_len = u16::try_from(name_bytes.len()).unwrap_or(u16::MAX);
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(name_bytes);

            let mut flags = 0u8;
            if options.auto_increment {
                flags |= 0b01;
            }
            if options.key_path.is_some() {
                flags |= 0b10;
            }
            buf.push(flags);

            if let Some(ref path) = options.key_path {
                let path_bytes = path.as_bytes();
                let path_len = u16::try_from(path_bytes.len()).unwrap_or(u16::MAX);
                buf.extend_from_slice(&path_len.to_le_bytes());
                buf.extend_from_slice(path_bytes);
            }
        }

        buf
    }

    /// Decodes a schema from bytes.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        let mut cursor = 0;

        if data.len() < 4 || data[0..4] != SCHEMA_MAGIC {
            return Err(EngineError::corrupted("invalid schema magic"));
        }
        cursor += 4;

        let encoding = read_u16(data, &mut cursor)?;
        if encoding > SCHEMA_ENCODING_VERSION {
            return Err(EngineError::corrupted(format!(
                "unsupported schema encoding: {encoding}"
            )));
        }

        let version = read_u64(data, &mut cursor)?;
        let store_count = read_u32(data, &mut cursor)? as usize;

        let mut stores = BTreeMap::new();
        for _ in 0..store_count {
            let name = read_string(data, &mut cursor)?;

            let flags = *data
                .get(cursor)
                .ok_or_else(|| EngineError::corrupted("schema too short"))?;
            cursor += 1;

            let key_path = if flags & 0b10 != 0 {
                Some(read_string(data, &mut cursor)?)
            } else {
                None
            };

            stores.insert(
                name,
                StoreOptions {
                    key_path,
                    auto_increment: flags & 0b01 != 0,
                },
            );
        }

        Ok(Self { version, stores })
    }
}

impl SchemaEditor for Schema {
    fn create_store(&mut self, name: &str, options: &StoreOptions) {
        self.stores
            .entry(name.to_string())
            .or_insert_with(|| options.clone());
    }

    fn delete_store(&mut self, name: &str) {
        self.stores.remove(name);
    }

    fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }
}

fn read_u16(data: &[u8], cursor: &mut usize) -> EngineResult<u16> {
    let end = *cursor + 2;
    if end > data.len() {
        return Err(EngineError::corrupted("schema too short"));
    }
    let value = u16::from_le_bytes([data[*cursor], data[*cursor + 1]]);
    *cursor = end;
    Ok(value)
}

fn read_u32(data: &[u8], cursor: &mut usize) -> EngineResult<u32> {
    let end = *cursor + 4;
    if end > data.len() {
        return Err(EngineError::corrupted("schema too short"));
    }
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[*cursor..end]);
    *cursor = end;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(data: &[u8], cursor: &mut usize) -> EngineResult<u64> {
    let end = *cursor + 8;
    if end > data.len() {
        return Err(EngineError::corrupted("schema too short"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*cursor..end]);
    *cursor = end;
    Ok(u64::from_le_bytes(bytes))
}

fn read_string(data: &[u8], cursor: &mut usize) -> EngineResult<String> {
    let len = read_u16(data, cursor)? as usize;
    let end = *cursor + len;
    if end > data.len() {
        return Err(EngineError::corrupted("schema too short"));
    }
    let value = std::str::from_utf8(&data[*cursor..end])
        .map_err(|_| EngineError::corrupted("invalid store name"))?
        .to_string();
    *cursor = end;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_schema_is_empty() {
        let schema = Schema::new(1);
        assert_eq!(schema.version, 1);
        assert!(schema.stores.is_empty());
    }

    #[test]
    fn create_store_is_idempotent() {
        let mut schema = Schema::new(1);

        schema.create_store("saves", &StoreOptions::new().key_path("id"));
        schema.create_store("saves", &StoreOptions::default());

        assert_eq!(schema.stores.len(), 1);
        // First creation wins; later creates do not reconfigure.
        assert_eq!(
            schema.stores["saves"].key_path.as_deref(),
            Some("id")
        );
    }

    #[test]
    fn delete_store_removes_entry() {
        let mut schema = Schema::new(1);
        schema.create_store("saves", &StoreOptions::default());

        schema.delete_store("saves");
        assert!(!schema.has_store("saves"));

        // Deleting again is a no-op.
        schema.delete_store("saves");
    }

    #[test]
    fn store_names_are_sorted() {
        let mut schema = Schema::new(1);
        schema.create_store("zeta", &StoreOptions::default());
        schema.create_store("alpha", &StoreOptions::default());

        assert_eq!(schema.store_names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut schema = Schema::new(7);
        schema.create_store("default", &StoreOptions::default());
        schema.create_store(
            "players",
            &StoreOptions::new().key_path("id").auto_increment(true),
        );

        let encoded = schema.encode();
        let decoded = Schema::decode(&encoded).unwrap();

        assert_eq!(decoded, schema);
    }

    #[test]
    fn invalid_magic_rejected() {
        let result = Schema::decode(b"XXXX");
        assert!(matches!(result, Err(EngineError::Corrupted { .. })));
    }

    #[test]
    fn truncated_input_rejected() {
        let mut schema = Schema::new(3);
        schema.create_store("default", &StoreOptions::default());
        let encoded = schema.encode();

        for len in 0..encoded.len() {
            assert!(Schema::decode(&encoded[..len]).is_err());
        }
    }

    #[test]
    fn future_encoding_rejected() {
        let mut encoded = Schema::new(1).encode();
        encoded[4] = 0xFF;
        encoded[5] = 0xFF;
        assert!(Schema::decode(&encoded).is_err());
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_stores(
            version in 1u64..u64::MAX,
            names in proptest::collection::btree_set("[a-z_][a-z0-9_]{0,24}", 0..8),
            auto in any::<bool>(),
        ) {
            let mut schema = Schema::new(version);
            for name in &names {
                schema.create_store(name, &StoreOptions::new().auto_increment(auto));
            }

            let decoded = Schema::decode(&schema.encode()).unwrap();
            prop_assert_eq!(decoded, schema);
        }
    }
}
