//! Edge configuration and the secret store seam.
//!
//! # Environment Variables
//!
//! - `INVENTORY_DB_URL`: database base URL (default `https://db.fauna.com`)
//! - `INVENTORY_DB_BACKEND`: named backend for the fetch (default `fauna`)
//! - `INVENTORY_DB_ORIGIN`: origin serving that backend (default: the base URL)
//! - `INVENTORY_SECRET_KEY`: secret store key of the credential (default `FAUNA_ACCESS_KEY`)
//! - `INVENTORY_HEALTH_TTL`: cache TTL in seconds for the health query (default 60)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE_URL: &str = "https://db.fauna.com";
pub const DEFAULT_BACKEND: &str = "fauna";
pub const DEFAULT_SECRET_KEY: &str = "FAUNA_ACCESS_KEY";
pub const DEFAULT_HEALTH_CACHE_TTL: u32 = 60;

/// Read-only configuration shared by every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Base URL the query path is resolved against.
    pub database_url: String,
    /// Named backend the platform fetch routes to.
    pub backend: String,
    /// Origin serving `backend`.
    pub backend_origin: String,
    /// Key under which the database credential is stored.
    pub secret_key: String,
    /// Cache TTL, in seconds, requested for the health query.
    pub health_cache_ttl: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            backend: DEFAULT_BACKEND.to_string(),
            backend_origin: DEFAULT_DATABASE_URL.to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            health_cache_ttl: DEFAULT_HEALTH_CACHE_TTL,
        }
    }
}

impl EdgeConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup("INVENTORY_DB_URL").unwrap_or(defaults.database_url);
        let backend_origin = lookup("INVENTORY_DB_ORIGIN").unwrap_or_else(|| database_url.clone());
        let backend = lookup("INVENTORY_DB_BACKEND").unwrap_or(defaults.backend);
        let secret_key = lookup("INVENTORY_SECRET_KEY").unwrap_or(defaults.secret_key);
        let health_cache_ttl = lookup("INVENTORY_HEALTH_TTL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.health_cache_ttl);

        Self {
            database_url,
            backend,
            backend_origin,
            secret_key,
            health_cache_ttl,
        }
    }
}

/// Key/value store holding the database credential.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// [`SecretStore`] backed by process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// [`SecretStore`] holding a fixed set of entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    entries: HashMap<String, String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}
