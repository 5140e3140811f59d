//! Connection pool for the ACL database.
//!
//! Two shapes exist: a file database (WAL, created on first open) and a
//! private `:memory:` database pinned to one connection.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to open ACL database: {0}")]
    Creation(#[from] sqlx::Error),

    #[error("ACL database is not answering: {0}")]
    HealthCheck(String),

    #[error("Invalid database location: {0}")]
    InvalidConfig(String),
}

/// Where the ACL tables live and how many connections may touch them.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Database file, or `:memory:`.
    pub path: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
    /// `None` keeps idle connections open
    pub idle_timeout: Option<Duration>,
    /// `None` never recycles connections
    pub max_lifetime: Option<Duration>,
}

impl PoolConfig {
    /// A file database. Missing files are created.
    pub fn file(path: impl Into<String>) -> Result<Self, PoolError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(PoolError::InvalidConfig("database path is empty".to_string()));
        }
        if path == MEMORY_PATH {
            return Ok(Self::in_memory());
        }
        Ok(Self {
            path,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        })
    }

    /// A private in-memory database. Pinned to a single connection that is
    /// never recycled; closing it discards the data.
    pub fn in_memory() -> Self {
        Self {
            path: MEMORY_PATH.to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    pub fn with_max_connections(mut self, max: u32) -> Result<Self, PoolError> {
        if max == 0 {
            return Err(PoolError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.is_in_memory() && max > 1 {
            return Err(PoolError::InvalidConfig(
                "an in-memory database cannot be shared across connections".to_string(),
            ));
        }
        self.max_connections = max;
        Ok(self)
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, PoolError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", self.path))
            .map_err(|e| PoolError::InvalidConfig(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(self.busy_timeout)
            .synchronous(SqliteSynchronous::Normal)
            // Cascading detaches rely on this.
            .foreign_keys(true);

        if self.is_in_memory() {
            Ok(options)
        } else {
            Ok(options.journal_mode(SqliteJournalMode::Wal))
        }
    }
}

/// Open pool plus the location it was opened from.
pub struct DatabasePool {
    pool: SqlitePool,
    config: PoolConfig,
}

impl DatabasePool {
    #[instrument(skip(config), fields(path = %config.path))]
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(config.connect_options()?)
            .await?;

        info!(max_connections = config.max_connections, "ACL database opened");

        let db = Self { pool, config };
        db.health_check().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), PoolError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PoolError::HealthCheck(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.config.path))]
    pub async fn close(&self) {
        info!("closing ACL database");
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_test_utils::{temp_db_path, temp_dir};

    #[tokio::test]
    async fn test_in_memory_pool_opens_and_closes() {
        let db = DatabasePool::new(PoolConfig::in_memory()).await.unwrap();

        assert_eq!(db.path(), MEMORY_PATH);
        db.health_check().await.unwrap();
        db.close().await;
        assert!(db.is_closed());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = DatabasePool::new(PoolConfig::in_memory()).await.unwrap();

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_file_database_is_created_in_wal_mode() {
        let dir = temp_dir();
        let path = temp_db_path(&dir);
        let db = DatabasePool::new(PoolConfig::file(path.to_string_lossy()).unwrap())
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
        db.close().await;
    }

    #[test]
    fn test_file_config_rejects_bad_locations() {
        assert!(matches!(PoolConfig::file("  "), Err(PoolError::InvalidConfig(_))));
        assert!(PoolConfig::file(MEMORY_PATH).unwrap().is_in_memory());
    }

    #[test]
    fn test_connection_limits() {
        assert!(PoolConfig::file("acl.db").unwrap().with_max_connections(0).is_err());
        assert!(PoolConfig::in_memory().with_max_connections(2).is_err());

        let config = PoolConfig::file("acl.db").unwrap().with_max_connections(2).unwrap();
        assert_eq!(config.max_connections, 2);
    }
}
