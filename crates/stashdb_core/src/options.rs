//! Store-option fragment parsing.
//!
//! Hosts hand store creation options across the boundary as a small JSON
//! fragment, e.g. `{"keyPath": "id", "autoIncrement": true}`. A fragment
//! that fails to parse degrades to [`StoreOptions::default`] with a warning
//! instead of failing the creation.

use serde::Deserialize;
use stashdb_storage::StoreOptions;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawOptions {
    key_path: Option<String>,
    auto_increment: bool,
}

/// Parses a store-options fragment.
///
/// An empty or whitespace-only fragment yields the defaults silently;
/// anything else must be a JSON object. Unknown fields are ignored.
#[must_use]
pub fn parse_store_options(fragment: &str) -> StoreOptions {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return StoreOptions::default();
    }

    match serde_json::from_str::<RawOptions>(trimmed) {
        Ok(raw) => StoreOptions {
            key_path: raw.key_path,
            auto_increment: raw.auto_increment,
        },
        Err(e) => {
            warn!(fragment, error = %e, "malformed store options, using defaults");
            StoreOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fragment_yields_defaults() {
        assert_eq!(parse_store_options(""), StoreOptions::default());
        assert_eq!(parse_store_options("   "), StoreOptions::default());
    }

    #[test]
    fn full_fragment_parses() {
        let options = parse_store_options(r#"{"keyPath": "id", "autoIncrement": true}"#);
        assert_eq!(options.key_path.as_deref(), Some("id"));
        assert!(options.auto_increment);
    }

    #[test]
    fn partial_fragment_parses() {
        let options = parse_store_options(r#"{"autoIncrement": true}"#);
        assert_eq!(options.key_path, None);
        assert!(options.auto_increment);
    }

    #[test]
    fn unknown_fields_ignored() {
        let options = parse_store_options(r#"{"keyPath": "id", "color": "blue"}"#);
        assert_eq!(options.key_path.as_deref(), Some("id"));
    }

    #[test]
    fn malformed_fragment_degrades_to_defaults() {
        for fragment in ["{", "keyPath=id", "[1,2]", "{\"keyPath\": 7}"] {
            assert_eq!(
                parse_store_options(fragment),
                StoreOptions::default(),
                "fragment {fragment:?} should fall back to defaults"
            );
        }
    }
}
