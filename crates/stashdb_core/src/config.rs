//! Client configuration.

/// Configuration for constructing a [`StorageClient`](crate::StorageClient).
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the database the client opens.
    pub database_name: String,

    /// Store used when an operation does not name one.
    pub default_store: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_name: "stashdb".to_string(),
            default_store: "default".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database name.
    #[must_use]
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets the default store name.
    #[must_use]
    pub fn default_store(mut self, name: impl Into<String>) -> Self {
        self.default_store = name.into();
        self
    }
}
