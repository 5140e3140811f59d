//! Persistence port for roles, permissions and their associations.

mod memory;

pub use memory::MemoryStore;

use crate::actor::Holder;
use crate::error::AclResult;
use crate::permission::{NewPermission, Permission};
use crate::role::{NewRole, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_common_core::{ActorId, PermissionId, RoleId};

/// Outcome of replacing a relation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncChanges<Id> {
    pub attached: Vec<Id>,
    pub detached: Vec<Id>,
    pub unchanged: Vec<Id>,
}

impl<Id> SyncChanges<Id> {
    /// Whether the sync altered the relation.
    pub fn changed(&self) -> bool {
        !self.attached.is_empty() || !self.detached.is_empty()
    }
}

impl<Id: Copy + Eq> SyncChanges<Id> {
    /// Diff the current relation set against the desired one, preserving input order.
    pub fn diff(current: &[Id], desired: &[Id]) -> Self {
        let mut attached = Vec::new();
        let mut unchanged = Vec::new();
        for id in desired {
            if attached.contains(id) || unchanged.contains(id) {
                continue;
            }
            if current.contains(id) {
                unchanged.push(*id);
            } else {
                attached.push(*id);
            }
        }

        let detached = current
            .iter()
            .filter(|id| !desired.contains(id))
            .copied()
            .collect();

        Self {
            attached,
            detached,
            unchanged,
        }
    }
}

/// Storage backend for the access control tables.
///
/// Loaded roles always carry their permissions. Permissions returned by
/// [`AclStore::permissions_with_roles`] carry their roles; elsewhere the role
/// relation is left unloaded.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Insert all permissions atomically. A slug collision aborts the whole batch.
    async fn insert_permissions(&self, permissions: Vec<NewPermission>) -> AclResult<Vec<Permission>>;

    async fn update_permission(&self, permission: &Permission) -> AclResult<Permission>;

    /// Delete a permission and its role associations.
    async fn delete_permission(&self, id: PermissionId) -> AclResult<bool>;

    async fn find_permission(&self, id: PermissionId) -> AclResult<Option<Permission>>;

    async fn find_permission_by_slug(&self, slug: &str) -> AclResult<Option<Permission>>;

    /// Every permission with its role relation loaded.
    async fn permissions_with_roles(&self) -> AclResult<Vec<Permission>>;

    async fn insert_role(&self, role: NewRole) -> AclResult<Role>;

    async fn update_role(&self, role: &Role) -> AclResult<Role>;

    /// Delete a role, detaching all permission and actor associations.
    async fn delete_role(&self, id: RoleId) -> AclResult<bool>;

    async fn find_role(&self, id: RoleId) -> AclResult<Option<Role>>;

    async fn find_role_by_slug(&self, slug: &str) -> AclResult<Option<Role>>;

    async fn roles(&self) -> AclResult<Vec<Role>>;

    /// Roles assigned to `holder`.
    async fn roles_of(&self, holder: Holder) -> AclResult<Vec<Role>>;

    /// Attach a role. Returns `false` when it was already attached.
    async fn attach_role(&self, holder: Holder, role: RoleId) -> AclResult<bool>;

    /// Detach one role, or every role when `role` is `None`. Returns the number detached.
    async fn detach_roles(&self, holder: Holder, role: Option<RoleId>) -> AclResult<usize>;

    /// Replace the holder's roles with exactly `roles`.
    async fn sync_roles(&self, holder: Holder, roles: &[RoleId]) -> AclResult<SyncChanges<RoleId>>;

    /// Actors holding any of the given roles.
    async fn actors_having_roles(&self, roles: &[RoleId]) -> AclResult<Vec<ActorId>>;

    /// Actors holding any role with one of the given slugs.
    async fn actors_having_role_slugs(&self, slugs: &[&str]) -> AclResult<Vec<ActorId>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_diff() {
        let changes = SyncChanges::diff(&[1, 2, 3], &[3, 4, 4]);
        assert_eq!(changes.attached, vec![4]);
        assert_eq!(changes.detached, vec![1, 2]);
        assert_eq!(changes.unchanged, vec![3]);
        assert!(changes.changed());
    }

    #[test]
    fn test_sync_diff_noop() {
        let changes = SyncChanges::diff(&[1, 2], &[2, 1]);
        assert!(!changes.changed());
        assert_eq!(changes.unchanged, vec![2, 1]);
    }
}
