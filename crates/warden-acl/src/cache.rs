//! Cache port and the permission snapshot cache.

use crate::error::{AclError, AclResult};
use crate::permission::Permission;
use crate::store::AclStore;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use warden_common_config::CacheConfig;

/// Minimal cache-aside backend. Values are JSON strings; entries never expire.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AclResult<Option<String>>;

    async fn put_forever(&self, key: &str, value: String) -> AclResult<()>;

    /// Remove an entry. Returns whether one existed.
    async fn forget(&self, key: &str) -> AclResult<bool>;
}

/// Return the cached value under `key`, or compute, store and return it.
pub async fn remember_forever<T, F, Fut>(cache: &dyn CacheStore, key: &str, compute: F) -> AclResult<T>
where
    T: Serialize + DeserializeOwned + Send,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = AclResult<T>> + Send,
{
    if let Some(raw) = cache.get(key).await? {
        debug!(key, "cache hit");
        return Ok(serde_json::from_str(&raw)?);
    }

    debug!(key, "cache miss");
    let value = compute().await?;
    cache.put_forever(key, serde_json::to_string(&value)?).await?;
    Ok(value)
}

/// In-memory cache store.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, String>,
    failing: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads and writes fail, to exercise outage handling. `forget` keeps working.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn check(&self) -> AclResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AclError::cache("in-memory cache failing"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> AclResult<Option<String>> {
        self.check()?;
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put_forever(&self, key: &str, value: String) -> AclResult<()> {
        self.check()?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn forget(&self, key: &str) -> AclResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// Redis-backed cache store (shared across processes).
#[cfg(feature = "redis")]
pub struct RedisCache {
    client: redis::Client,
    prefix: String,
}

#[cfg(feature = "redis")]
impl RedisCache {
    pub fn new(redis_url: &str, prefix: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn connection(&self) -> AclResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AclError::cache(e.to_string()))
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> AclResult<Option<String>> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(self.key(key))
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| AclError::cache(e.to_string()))
    }

    async fn put_forever(&self, key: &str, value: String) -> AclResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AclError::cache(e.to_string()))
    }

    async fn forget(&self, key: &str) -> AclResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| AclError::cache(e.to_string()))?;
        Ok(removed > 0)
    }
}

/// Notified with the fresh snapshot whenever [`PermissionCache::rebuild`] runs.
pub trait PermissionListener: Send + Sync {
    fn permissions_changed(&self, permissions: &[Permission]);
}

/// The "all permissions with roles" snapshot, stored under `acl.cache.key`.
#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    listeners: Arc<RwLock<Vec<Arc<dyn PermissionListener>>>>,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            listeners: Arc::default(),
        }
    }

    /// Shared by every clone of this cache.
    pub fn subscribe(&self, listener: Arc<dyn PermissionListener>) {
        self.listeners.write().push(listener);
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Current snapshot, without computing one.
    pub async fn cached(&self) -> AclResult<Option<Vec<Permission>>> {
        match self.store.get(self.key()).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Snapshot from the cache, computing and storing it on a miss.
    /// With caching disabled, `compute` runs every time.
    pub async fn remember<F, Fut>(&self, compute: F) -> AclResult<Vec<Permission>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AclResult<Vec<Permission>>> + Send,
    {
        if self.enabled() {
            remember_forever(self.store.as_ref(), self.key(), compute).await
        } else {
            compute().await
        }
    }

    pub async fn forget(&self) -> AclResult<bool> {
        self.store.forget(self.key()).await
    }

    /// Drop the snapshot. Failures are logged, never returned.
    pub async fn invalidate(&self) {
        match self.forget().await {
            Ok(existed) => debug!(key = self.key(), existed, "permission cache invalidated"),
            Err(e) => warn!(key = self.key(), error = %e, "failed to invalidate permission cache"),
        }
    }

    /// Replace the snapshot after a write: forget it, recompute it from
    /// `store` and hand the result to every listener.
    ///
    /// A failed recompute leaves the key forgotten and notifies listeners
    /// with an empty list. Never fails; the write that triggered it has
    /// already succeeded.
    pub async fn rebuild(&self, store: &dyn AclStore) -> Vec<Permission> {
        self.invalidate().await;

        let permissions = match self.remember(|| store.permissions_with_roles()).await {
            Ok(permissions) => {
                debug!(key = self.key(), count = permissions.len(), "permission cache rebuilt");
                permissions
            }
            Err(e) => {
                warn!(key = self.key(), error = %e, "failed to rebuild permission cache");
                self.invalidate().await;
                Vec::new()
            }
        };

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.permissions_changed(&permissions);
        }
        permissions
    }
}
