//! Configuration types.

use serde::{Deserialize, Serialize};

/// Default cache key for the permission snapshot.
pub const DEFAULT_CACHE_KEY: &str = "permissions.policies";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Access control settings (`acl.*`).
    pub acl: AclConfig,
    /// Database settings.
    pub database: DatabaseSettings,
}

/// Access control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Permission cache settings.
    pub cache: CacheConfig,
    /// Entity identifier for permissions. Stores map it to their table name.
    pub permission: String,
    /// Entity identifier for roles. Stores map it to their table name.
    pub role: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            permission: "permissions".to_string(),
            role: "roles".to_string(),
        }
    }
}

/// Permission cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remember the permission snapshot forever until invalidated.
    pub enabled: bool,
    /// Cache key for the snapshot.
    pub key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: DEFAULT_CACHE_KEY.to_string(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "warden.db".to_string(),
        }
    }
}
