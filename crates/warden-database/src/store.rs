//! SQLite implementation of [`AclStore`].

use crate::error::{is_unique_violation, store_err, DatabaseError};
use crate::pool::{DatabasePool, PoolConfig};
use crate::schema::{bootstrap, TableNames, ROLE_PERMISSION_TABLE, ROLE_USER_TABLE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, instrument};
use warden_acl::{
    AclError, AclResult, AclStore, EntityKind, Holder, NewPermission, NewRole, Permission, Role, SyncChanges,
};
use warden_common_config::AclConfig;
use warden_common_core::{ActorId, PermissionId, RoleId, Timestamp};

const PERMISSION_COLUMNS: &str = "p.id, p.name, p.slug, p.model, p.created_at, p.updated_at";
const ROLE_COLUMNS: &str = "r.id, r.name, r.slug, r.description, r.system, r.created_at, r.updated_at";

#[derive(FromRow)]
struct PermissionRow {
    id: String,
    name: String,
    slug: String,
    model: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRow {
    fn into_permission(self) -> AclResult<Permission> {
        Ok(Permission {
            id: parse_id(&self.id, PermissionId::parse)?,
            name: self.name,
            slug: self.slug,
            model: self.model,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
            roles: None,
        })
    }
}

#[derive(FromRow)]
struct RoleRow {
    id: String,
    name: String,
    slug: String,
    description: Option<String>,
    system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self) -> AclResult<Role> {
        Ok(Role {
            id: parse_id(&self.id, RoleId::parse)?,
            name: self.name,
            slug: self.slug,
            description: self.description,
            system: self.system,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
            permissions: Vec::new(),
        })
    }
}

/// A role granting a permission, as returned by the grants join.
#[derive(FromRow)]
struct GrantRow {
    permission_id: String,
    #[sqlx(flatten)]
    role: RoleRow,
}

fn parse_id<T, E: Display>(raw: &str, parse: fn(&str) -> Result<T, E>) -> AclResult<T> {
    parse(raw).map_err(|e| AclError::store(format!("malformed id '{raw}': {e}")))
}

fn write_err(err: sqlx::Error, entity: EntityKind, slug: &str) -> AclError {
    if is_unique_violation(&err) {
        AclError::DuplicateSlug {
            entity,
            slug: slug.to_string(),
        }
    } else {
        store_err(err)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Join table, holder column and holder key for a role holder.
fn holder_binding(holder: Holder) -> (&'static str, &'static str, String) {
    match holder {
        Holder::Permission(id) => (ROLE_PERMISSION_TABLE, "permission_id", id.as_uuid().to_string()),
        Holder::Actor(id) => (ROLE_USER_TABLE, "user_id", id.as_uuid().to_string()),
    }
}

/// Roles, permissions and their associations in SQLite.
///
/// Entity table names come from `acl.permission` / `acl.role`; the join
/// tables are always `role_permission` and `role_user`.
pub struct SqliteStore {
    db: DatabasePool,
    tables: TableNames,
}

impl SqliteStore {
    /// Wrap an open pool, creating missing tables.
    pub async fn new(db: DatabasePool, tables: TableNames) -> Result<Self, DatabaseError> {
        bootstrap(db.pool(), &tables).await?;
        Ok(Self { db, tables })
    }

    /// Open (or create) the database at `path`. `:memory:` gives a private in-memory database.
    pub async fn open(path: &str, config: &AclConfig) -> Result<Self, DatabaseError> {
        let pool_config = PoolConfig::file(path)?;
        let tables = TableNames::from_config(config)?;
        Self::new(DatabasePool::new(pool_config).await?, tables).await
    }

    pub async fn in_memory() -> Result<Self, DatabaseError> {
        Self::new(DatabasePool::new(PoolConfig::in_memory()).await?, TableNames::default()).await
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.db
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn permissions_of_role(&self, role: RoleId) -> AclResult<Vec<Permission>> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM {ROLE_PERMISSION_TABLE} rp \
             JOIN {} p ON p.id = rp.permission_id \
             WHERE rp.role_id = ? ORDER BY rp.rowid",
            self.tables.permissions
        );
        sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(role.as_uuid().to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(store_err)?
            .into_iter()
            .map(PermissionRow::into_permission)
            .collect()
    }

    async fn hydrate(&self, row: RoleRow) -> AclResult<Role> {
        let mut role = row.into_role()?;
        role.permissions = self.permissions_of_role(role.id).await?;
        Ok(role)
    }

    async fn hydrate_all(&self, rows: Vec<RoleRow>) -> AclResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            roles.push(self.hydrate(row).await?);
        }
        Ok(roles)
    }

    async fn find_role_where(&self, column: &str, value: String) -> AclResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM {} r WHERE r.{column} = ?", self.tables.roles);
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(value)
            .fetch_optional(self.db.pool())
            .await
            .map_err(store_err)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_permission_where(&self, column: &str, value: String) -> AclResult<Option<Permission>> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM {} p WHERE p.{column} = ?",
            self.tables.permissions
        );
        sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(value)
            .fetch_optional(self.db.pool())
            .await
            .map_err(store_err)?
            .map(PermissionRow::into_permission)
            .transpose()
    }

    async fn ensure_holder(&self, conn: &mut SqliteConnection, holder: Holder) -> AclResult<()> {
        if let Holder::Permission(id) = holder {
            let sql = format!("SELECT 1 FROM {} WHERE id = ?", self.tables.permissions);
            let found: Option<i64> = sqlx::query_scalar(&sql)
                .bind(id.as_uuid().to_string())
                .fetch_optional(&mut *conn)
                .await
                .map_err(store_err)?;
            if found.is_none() {
                return Err(AclError::PermissionNotFound(id.to_string()));
            }
        }
        Ok(())
    }

    async fn ensure_role(&self, conn: &mut SqliteConnection, role: RoleId) -> AclResult<()> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", self.tables.roles);
        let found: Option<i64> = sqlx::query_scalar(&sql)
            .bind(role.as_uuid().to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(store_err)?;
        found
            .map(|_| ())
            .ok_or_else(|| AclError::RoleNotFound(role.to_string()))
    }

    async fn role_ids_of(&self, conn: &mut SqliteConnection, holder: Holder) -> AclResult<Vec<RoleId>> {
        let (table, column, key) = holder_binding(holder);
        let sql = format!("SELECT role_id FROM {table} WHERE {column} = ? ORDER BY rowid");
        let raw: Vec<String> = sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_all(&mut *conn)
            .await
            .map_err(store_err)?;
        raw.iter().map(|id| parse_id(id, RoleId::parse)).collect()
    }

    async fn insert_link(&self, conn: &mut SqliteConnection, holder: Holder, role: RoleId) -> AclResult<bool> {
        let role_key = role.as_uuid().to_string();
        let result = match holder {
            Holder::Permission(id) => {
                sqlx::query(&format!(
                    "INSERT OR IGNORE INTO {ROLE_PERMISSION_TABLE} (role_id, permission_id) VALUES (?, ?)"
                ))
                .bind(role_key)
                .bind(id.as_uuid().to_string())
                .execute(&mut *conn)
                .await
            }
            Holder::Actor(id) => {
                let now = Utc::now();
                sqlx::query(&format!(
                    "INSERT OR IGNORE INTO {ROLE_USER_TABLE} (role_id, user_id, created_at, updated_at) \
                     VALUES (?, ?, ?, ?)"
                ))
                .bind(role_key)
                .bind(id.as_uuid().to_string())
                .bind(now)
                .bind(now)
                .execute(&mut *conn)
                .await
            }
        }
        .map_err(store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_links(
        &self,
        conn: &mut SqliteConnection,
        holder: Holder,
        role: Option<RoleId>,
    ) -> AclResult<usize> {
        let (table, column, key) = holder_binding(holder);
        let result = match role {
            Some(role) => {
                sqlx::query(&format!("DELETE FROM {table} WHERE {column} = ? AND role_id = ?"))
                    .bind(key)
                    .bind(role.as_uuid().to_string())
                    .execute(&mut *conn)
                    .await
            }
            None => {
                sqlx::query(&format!("DELETE FROM {table} WHERE {column} = ?"))
                    .bind(key)
                    .execute(&mut *conn)
                    .await
            }
        }
        .map_err(store_err)?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl AclStore for SqliteStore {
    #[instrument(skip_all, fields(count = permissions.len()))]
    async fn insert_permissions(&self, permissions: Vec<NewPermission>) -> AclResult<Vec<Permission>> {
        let sql = format!(
            "INSERT INTO {} (id, name, slug, model, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            self.tables.permissions
        );
        let mut tx = self.db.pool().begin().await.map_err(store_err)?;
        let mut created = Vec::with_capacity(permissions.len());

        for new in permissions {
            let permission = new.into_permission();
            sqlx::query(&sql)
                .bind(permission.id.as_uuid().to_string())
                .bind(&permission.name)
                .bind(&permission.slug)
                .bind(permission.model.as_deref())
                .bind(permission.created_at.as_datetime())
                .bind(permission.updated_at.as_datetime())
                .execute(&mut *tx)
                .await
                .map_err(|e| write_err(e, EntityKind::Permission, &permission.slug))?;
            created.push(permission);
        }

        tx.commit().await.map_err(store_err)?;
        debug!(count = created.len(), "permissions inserted");
        Ok(created)
    }

    async fn update_permission(&self, permission: &Permission) -> AclResult<Permission> {
        let sql = format!(
            "UPDATE {} SET name = ?, slug = ?, model = ?, updated_at = ? WHERE id = ?",
            self.tables.permissions
        );
        let result = sqlx::query(&sql)
            .bind(&permission.name)
            .bind(&permission.slug)
            .bind(permission.model.as_deref())
            .bind(Utc::now())
            .bind(permission.id.as_uuid().to_string())
            .execute(self.db.pool())
            .await
            .map_err(|e| write_err(e, EntityKind::Permission, &permission.slug))?;

        if result.rows_affected() == 0 {
            return Err(AclError::PermissionNotFound(permission.id.to_string()));
        }
        self.find_permission(permission.id)
            .await?
            .ok_or_else(|| AclError::PermissionNotFound(permission.id.to_string()))
    }

    async fn delete_permission(&self, id: PermissionId) -> AclResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.tables.permissions);
        let result = sqlx::query(&sql)
            .bind(id.as_uuid().to_string())
            .execute(self.db.pool())
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_permission(&self, id: PermissionId) -> AclResult<Option<Permission>> {
        self.find_permission_where("id", id.as_uuid().to_string()).await
    }

    async fn find_permission_by_slug(&self, slug: &str) -> AclResult<Option<Permission>> {
        self.find_permission_where("slug", slug.to_string()).await
    }

    async fn permissions_with_roles(&self) -> AclResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM {} p ORDER BY p.rowid",
            self.tables.permissions
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;

        let grants = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT rp.permission_id, {ROLE_COLUMNS} FROM {ROLE_PERMISSION_TABLE} rp \
             JOIN {} r ON r.id = rp.role_id ORDER BY rp.rowid",
            self.tables.roles
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;

        let mut by_permission: HashMap<String, Vec<Role>> = HashMap::new();
        for grant in grants {
            by_permission
                .entry(grant.permission_id)
                .or_default()
                .push(grant.role.into_role()?);
        }

        permissions
            .into_iter()
            .map(|row| {
                let roles = by_permission.remove(&row.id).unwrap_or_default();
                let mut permission = row.into_permission()?;
                permission.roles = Some(roles);
                Ok(permission)
            })
            .collect()
    }

    async fn insert_role(&self, role: NewRole) -> AclResult<Role> {
        let role = role.into_role();
        let sql = format!(
            "INSERT INTO {} (id, name, slug, description, system, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.tables.roles
        );
        sqlx::query(&sql)
            .bind(role.id.as_uuid().to_string())
            .bind(&role.name)
            .bind(&role.slug)
            .bind(role.description.as_deref())
            .bind(role.system)
            .bind(role.created_at.as_datetime())
            .bind(role.updated_at.as_datetime())
            .execute(self.db.pool())
            .await
            .map_err(|e| write_err(e, EntityKind::Role, &role.slug))?;
        Ok(role)
    }

    async fn update_role(&self, role: &Role) -> AclResult<Role> {
        let sql = format!(
            "UPDATE {} SET name = ?, slug = ?, description = ?, system = ?, updated_at = ? WHERE id = ?",
            self.tables.roles
        );
        let result = sqlx::query(&sql)
            .bind(&role.name)
            .bind(&role.slug)
            .bind(role.description.as_deref())
            .bind(role.system)
            .bind(Utc::now())
            .bind(role.id.as_uuid().to_string())
            .execute(self.db.pool())
            .await
            .map_err(|e| write_err(e, EntityKind::Role, &role.slug))?;

        if result.rows_affected() == 0 {
            return Err(AclError::RoleNotFound(role.id.to_string()));
        }
        self.find_role(role.id)
            .await?
            .ok_or_else(|| AclError::RoleNotFound(role.id.to_string()))
    }

    async fn delete_role(&self, id: RoleId) -> AclResult<bool> {
        // Join rows go with it (ON DELETE CASCADE).
        let sql = format!("DELETE FROM {} WHERE id = ?", self.tables.roles);
        let result = sqlx::query(&sql)
            .bind(id.as_uuid().to_string())
            .execute(self.db.pool())
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_role(&self, id: RoleId) -> AclResult<Option<Role>> {
        self.find_role_where("id", id.as_uuid().to_string()).await
    }

    async fn find_role_by_slug(&self, slug: &str) -> AclResult<Option<Role>> {
        self.find_role_where("slug", slug.to_string()).await
    }

    async fn roles(&self) -> AclResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM {} r ORDER BY r.rowid",
            self.tables.roles
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(store_err)?;
        self.hydrate_all(rows).await
    }

    async fn roles_of(&self, holder: Holder) -> AclResult<Vec<Role>> {
        let (table, column, key) = holder_binding(holder);
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM {table} h JOIN {} r ON r.id = h.role_id \
             WHERE h.{column} = ? ORDER BY h.rowid",
            self.tables.roles
        );
        let rows = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(key)
            .fetch_all(self.db.pool())
            .await
            .map_err(store_err)?;
        self.hydrate_all(rows).await
    }

    async fn attach_role(&self, holder: Holder, role: RoleId) -> AclResult<bool> {
        let mut tx = self.db.pool().begin().await.map_err(store_err)?;
        self.ensure_holder(&mut tx, holder).await?;
        self.ensure_role(&mut tx, role).await?;
        let attached = self.insert_link(&mut tx, holder, role).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(attached)
    }

    async fn detach_roles(&self, holder: Holder, role: Option<RoleId>) -> AclResult<usize> {
        let mut conn = self.db.pool().acquire().await.map_err(store_err)?;
        self.delete_links(&mut conn, holder, role).await
    }

    #[instrument(skip(self, roles), fields(count = roles.len()))]
    async fn sync_roles(&self, holder: Holder, roles: &[RoleId]) -> AclResult<SyncChanges<RoleId>> {
        let mut tx = self.db.pool().begin().await.map_err(store_err)?;

        self.ensure_holder(&mut tx, holder).await?;
        for role in roles {
            self.ensure_role(&mut tx, *role).await?;
        }

        let current = self.role_ids_of(&mut tx, holder).await?;
        let changes = SyncChanges::diff(&current, roles);
        for role in &changes.detached {
            self.delete_links(&mut tx, holder, Some(*role)).await?;
        }
        for role in &changes.attached {
            self.insert_link(&mut tx, holder, *role).await?;
        }

        tx.commit().await.map_err(store_err)?;
        debug!(
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            "roles synced"
        );
        Ok(changes)
    }

    async fn actors_having_roles(&self, roles: &[RoleId]) -> AclResult<Vec<ActorId>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT user_id FROM {ROLE_USER_TABLE} WHERE role_id IN ({}) \
             GROUP BY user_id ORDER BY MIN(rowid)",
            placeholders(roles.len())
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for role in roles {
            query = query.bind(role.as_uuid().to_string());
        }
        let raw = query.fetch_all(self.db.pool()).await.map_err(store_err)?;
        raw.iter().map(|id| parse_id(id, ActorId::parse)).collect()
    }

    async fn actors_having_role_slugs(&self, slugs: &[&str]) -> AclResult<Vec<ActorId>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT ru.user_id FROM {ROLE_USER_TABLE} ru JOIN {} r ON r.id = ru.role_id \
             WHERE r.slug IN ({}) GROUP BY ru.user_id ORDER BY MIN(ru.rowid)",
            self.tables.roles,
            placeholders(slugs.len())
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for slug in slugs {
            query = query.bind(slug.to_string());
        }
        let raw = query.fetch_all(self.db.pool()).await.map_err(store_err)?;
        raw.iter().map(|id| parse_id(id, ActorId::parse)).collect()
    }
}
