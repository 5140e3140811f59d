//! Table names and schema bootstrap.

use crate::error::DatabaseError;
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};
use warden_common_config::AclConfig;

/// Join table between roles and permissions.
pub const ROLE_PERMISSION_TABLE: &str = "role_permission";
/// Join table between roles and actors.
pub const ROLE_USER_TABLE: &str = "role_user";

/// Names of the two entity tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub permissions: String,
    pub roles: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            permissions: "permissions".to_string(),
            roles: "roles".to_string(),
        }
    }
}

impl TableNames {
    pub fn new(permissions: impl Into<String>, roles: impl Into<String>) -> Result<Self, DatabaseError> {
        let names = Self {
            permissions: permissions.into(),
            roles: roles.into(),
        };
        names.validate()?;
        Ok(names)
    }

    /// Table names from `acl.permission` / `acl.role`.
    pub fn from_config(config: &AclConfig) -> Result<Self, DatabaseError> {
        Self::new(config.permission.clone(), config.role.clone())
    }

    fn validate(&self) -> Result<(), DatabaseError> {
        for name in [&self.permissions, &self.roles] {
            let valid = name
                .chars()
                .next()
                .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(DatabaseError::InvalidTableName(name.clone()));
            }
            if name == ROLE_PERMISSION_TABLE || name == ROLE_USER_TABLE {
                return Err(DatabaseError::ReservedTableName(name.clone()));
            }
        }
        if self.permissions == self.roles {
            return Err(DatabaseError::ReservedTableName(self.roles.clone()));
        }
        Ok(())
    }

    fn statements(&self) -> Vec<String> {
        let Self { permissions, roles } = self;
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {permissions} (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL UNIQUE,
                    model TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {roles} (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL UNIQUE,
                    description TEXT,
                    system INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ROLE_PERMISSION_TABLE} (
                    role_id TEXT NOT NULL REFERENCES {roles}(id) ON DELETE CASCADE,
                    permission_id TEXT NOT NULL REFERENCES {permissions}(id) ON DELETE CASCADE,
                    PRIMARY KEY (role_id, permission_id)
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {ROLE_USER_TABLE} (
                    role_id TEXT NOT NULL REFERENCES {roles}(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (role_id, user_id)
                )"
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{ROLE_PERMISSION_TABLE}_permission ON {ROLE_PERMISSION_TABLE}(permission_id)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{ROLE_USER_TABLE}_user ON {ROLE_USER_TABLE}(user_id)"),
        ]
    }
}

/// Create any missing tables. Safe to run on every start.
#[instrument(skip(pool))]
pub async fn bootstrap(pool: &SqlitePool, tables: &TableNames) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await.map_err(DatabaseError::Schema)?;
    for statement in tables.statements() {
        debug!(statement = %statement.lines().next().unwrap_or_default(), "applying schema");
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Schema)?;
    }
    tx.commit().await.map_err(DatabaseError::Schema)?;

    info!(permissions = %tables.permissions, roles = %tables.roles, "schema ready");
    Ok(())
}
