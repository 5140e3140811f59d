//! Permission and role management.
//!
//! Every write that changes permissions or their role associations rebuilds
//! the permission snapshot afterwards and notifies its listeners. There is no
//! lock spanning the write and the rebuild; readers may briefly see the old
//! snapshot.

use crate::actor::Holder;
use crate::cache::PermissionCache;
use crate::error::{AclError, AclResult};
use crate::permission::{resource_permissions, NewPermission, Permission};
use crate::role::{NewRole, Role};
use crate::store::{AclStore, SyncChanges};
use std::sync::Arc;
use tracing::{info, instrument};
use warden_common_core::{PermissionId, RoleId};

/// Creates, updates and deletes permissions.
#[derive(Clone)]
pub struct PermissionCatalog {
    store: Arc<dyn AclStore>,
    cache: PermissionCache,
}

impl PermissionCatalog {
    pub fn new(store: Arc<dyn AclStore>, cache: PermissionCache) -> Self {
        Self { store, cache }
    }

    /// Create the five standard permissions for `resource`.
    ///
    /// Not idempotent: a second call for the same resource fails with
    /// [`AclError::DuplicateSlug`] and creates nothing.
    #[instrument(skip(self))]
    pub async fn create_resource(&self, resource: &str) -> AclResult<Vec<Permission>> {
        let created = self
            .store
            .insert_permissions(resource_permissions(resource))
            .await?;
        self.cache.rebuild(self.store.as_ref()).await;

        info!(resource, count = created.len(), "resource permissions created");
        Ok(created)
    }

    pub async fn create(&self, permission: NewPermission) -> AclResult<Permission> {
        let mut created = self.store.insert_permissions(vec![permission]).await?;
        self.cache.rebuild(self.store.as_ref()).await;
        created
            .pop()
            .ok_or_else(|| AclError::store("insert returned no permission"))
    }

    pub async fn update(&self, permission: &Permission) -> AclResult<Permission> {
        let updated = self.store.update_permission(permission).await?;
        self.cache.rebuild(self.store.as_ref()).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: PermissionId) -> AclResult<bool> {
        let deleted = self.store.delete_permission(id).await?;
        self.cache.rebuild(self.store.as_ref()).await;
        Ok(deleted)
    }

    /// Exact-match lookup.
    pub async fn find_by_slug(&self, slug: &str) -> AclResult<Option<Permission>> {
        self.store.find_permission_by_slug(slug).await
    }
}

/// Creates, updates and deletes roles, and manages the permissions they grant.
#[derive(Clone)]
pub struct RoleCatalog {
    store: Arc<dyn AclStore>,
    cache: PermissionCache,
}

impl RoleCatalog {
    pub fn new(store: Arc<dyn AclStore>, cache: PermissionCache) -> Self {
        Self { store, cache }
    }

    pub async fn create(&self, role: NewRole) -> AclResult<Role> {
        let role = self.store.insert_role(role).await?;
        info!(role = %role.slug, "role created");
        Ok(role)
    }

    pub async fn update(&self, role: &Role) -> AclResult<Role> {
        let updated = self.store.update_role(role).await?;
        // Cached permissions embed role attributes.
        self.cache.rebuild(self.store.as_ref()).await;
        Ok(updated)
    }

    /// Delete a role with all of its permission and actor associations.
    ///
    /// The `system` flag is read from the store, not from `role`.
    pub async fn delete(&self, role: &Role) -> AclResult<bool> {
        let Some(stored) = self.store.find_role(role.id).await? else {
            return Ok(false);
        };
        if stored.system {
            return Err(AclError::ProtectedRole(stored.slug));
        }

        let deleted = self.store.delete_role(role.id).await?;
        self.cache.rebuild(self.store.as_ref()).await;
        if deleted {
            info!(role = %role.slug, "role deleted");
        }
        Ok(deleted)
    }

    pub async fn find(&self, id: RoleId) -> AclResult<Option<Role>> {
        self.store.find_role(id).await
    }

    pub async fn find_by_slug(&self, slug: &str) -> AclResult<Option<Role>> {
        self.store.find_role_by_slug(slug).await
    }

    pub async fn all(&self) -> AclResult<Vec<Role>> {
        self.store.roles().await
    }

    /// Grant a permission to the role. Returns `false` if it was already granted.
    pub async fn grant_permission(&self, role: &mut Role, permission: &Permission) -> AclResult<bool> {
        let granted = self
            .store
            .attach_role(Holder::Permission(permission.id), role.id)
            .await?;
        self.finish(role).await?;
        Ok(granted)
    }

    pub async fn grant_permission_by_slug(&self, role: &mut Role, slug: &str) -> AclResult<bool> {
        let permission = self
            .store
            .find_permission_by_slug(slug)
            .await?
            .ok_or_else(|| AclError::PermissionNotFound(slug.to_string()))?;
        self.grant_permission(role, &permission).await
    }

    pub async fn revoke_permission(&self, role: &mut Role, permission: &Permission) -> AclResult<bool> {
        let removed = self
            .store
            .detach_roles(Holder::Permission(permission.id), Some(role.id))
            .await?;
        self.finish(role).await?;
        Ok(removed > 0)
    }

    /// Remove every permission from the role. Returns how many were removed.
    pub async fn revoke_all_permissions(&self, role: &mut Role) -> AclResult<usize> {
        let mut removed = 0;
        for permission in role.permissions.clone() {
            removed += self
                .store
                .detach_roles(Holder::Permission(permission.id), Some(role.id))
                .await?;
        }
        self.finish(role).await?;
        Ok(removed)
    }

    /// Make the role grant exactly `permissions`.
    pub async fn sync_permissions(
        &self,
        role: &mut Role,
        permissions: &[PermissionId],
    ) -> AclResult<SyncChanges<PermissionId>> {
        let current: Vec<PermissionId> = role.permissions.iter().map(|p| p.id).collect();
        let changes = SyncChanges::diff(&current, permissions);

        for id in &changes.detached {
            self.store
                .detach_roles(Holder::Permission(*id), Some(role.id))
                .await?;
        }
        for id in &changes.attached {
            self.store.attach_role(Holder::Permission(*id), role.id).await?;
        }

        self.finish(role).await?;
        Ok(changes)
    }

    /// Rebuild the snapshot and reload the role's permissions.
    async fn finish(&self, role: &mut Role) -> AclResult<()> {
        self.cache.rebuild(self.store.as_ref()).await;
        if let Some(fresh) = self.store.find_role(role.id).await? {
            role.permissions = fresh.permissions;
        }
        Ok(())
    }
}
