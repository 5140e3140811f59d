//! Services wired over the configured database.

use std::sync::Arc;

use tracing::debug;
use warden_acl::{
    AccessResolver, AclStore, CacheStore, InMemoryCache, Permission, PermissionCache, PermissionCatalog, Role,
    RoleAssignments, RoleCatalog,
};
use warden_common_config::WardenConfig;
use warden_database::SqliteStore;
use warden_gate::{GateRegistrar, GateRegistry};

use crate::error::CliError;
use crate::output::Printer;

/// Everything a command needs.
pub struct Context {
    pub config: WardenConfig,
    pub printer: Printer,
    pub store: Arc<SqliteStore>,
    pub cache: PermissionCache,
    pub permissions: PermissionCatalog,
    pub roles: RoleCatalog,
    pub assignments: RoleAssignments,
    pub resolver: AccessResolver,
}

impl Context {
    pub async fn open(config: WardenConfig, printer: Printer) -> Result<Self, CliError> {
        debug!(database = %config.database.path, "opening store");
        let store = Arc::new(SqliteStore::open(&config.database.path, &config.acl).await?);
        let cache = PermissionCache::new(cache_store()?, config.acl.cache.clone());
        let dyn_store: Arc<dyn AclStore> = store.clone();

        Ok(Self {
            permissions: PermissionCatalog::new(dyn_store.clone(), cache.clone()),
            roles: RoleCatalog::new(dyn_store.clone(), cache.clone()),
            assignments: RoleAssignments::new(dyn_store.clone(), cache.clone()),
            resolver: AccessResolver::new(dyn_store),
            config,
            printer,
            store,
            cache,
        })
    }

    pub fn registrar(&self, gate: Arc<GateRegistry>) -> GateRegistrar {
        GateRegistrar::new(gate, self.store.clone(), self.cache.clone())
    }

    pub async fn require_role(&self, slug: &str) -> Result<Role, CliError> {
        self.roles
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| CliError::not_found("role", slug))
    }

    pub async fn require_permission(&self, slug: &str) -> Result<Permission, CliError> {
        self.permissions
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| CliError::not_found("permission", slug))
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

#[cfg(not(feature = "redis"))]
fn cache_store() -> Result<Arc<dyn CacheStore>, CliError> {
    Ok(Arc::new(InMemoryCache::new()))
}

/// Shared Redis cache when `WARDEN_REDIS_URL` is set, else in-process.
#[cfg(feature = "redis")]
fn cache_store() -> Result<Arc<dyn CacheStore>, CliError> {
    use warden_common_config::{vars, Environment};

    match Environment::get(vars::WARDEN_REDIS_URL) {
        Some(url) => {
            let cache = warden_acl::RedisCache::new(&url, "warden:").map_err(|e| CliError::Validation {
                field: "WARDEN_REDIS_URL",
                message: e.to_string(),
            })?;
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(InMemoryCache::new())),
    }
}
