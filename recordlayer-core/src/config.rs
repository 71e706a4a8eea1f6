//! Adapter configuration.
//!
//! An [`AdapterConfig`] can be assembled with builder methods, parsed from JSON
//! (keys `url`, `database`, `typeMap`, `enableTransactions`) or read from the
//! process environment.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// Environment variable holding the store URL.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable holding the database name.
pub const ENV_DATABASE_NAME: &str = "DATABASE_NAME";
/// Environment variable enabling transactions (`true`, `1` or `yes`).
pub const ENV_ENABLE_TRANSACTIONS: &str = "ENABLE_TRANSACTIONS";

/// Settings consumed when connecting the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Store location. Required at connect time.
    pub url: Option<String>,
    /// Database name, for stores that host several.
    pub database: Option<String>,
    /// Record type to collection name. Unmapped types use their own name.
    pub type_map: HashMap<String, String>,
    /// Whether transactions get a real session. Disabled by default.
    pub enable_transactions: bool,
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Stores records of `record_type` in `collection`.
    pub fn map_type(mut self, record_type: impl Into<String>, collection: impl Into<String>) -> Self {
        self.type_map.insert(record_type.into(), collection.into());
        self
    }

    pub fn enable_transactions(mut self, enable: bool) -> Self {
        self.enable_transactions = enable;
        self
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup(ENV_DATABASE_URL),
            database: lookup(ENV_DATABASE_NAME),
            type_map: HashMap::new(),
            enable_transactions: lookup(ENV_ENABLE_TRANSACTIONS)
                .is_some_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
        }
    }

    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> AdapterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the store URL.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the URL is absent or blank.
    pub fn require_url(&self) -> AdapterResult<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AdapterError::Configuration("connection URL is required".to_string()))
    }

    /// Returns the collection holding records of `record_type`.
    pub fn collection_name<'a>(&'a self, record_type: &'a str) -> &'a str {
        self.type_map
            .get(record_type)
            .map(String::as_str)
            .unwrap_or(record_type)
    }
}
