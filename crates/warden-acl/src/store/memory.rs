//! In-memory store.

use super::{AclStore, SyncChanges};
use crate::actor::Holder;
use crate::error::{AclError, AclResult, EntityKind};
use crate::permission::{NewPermission, Permission};
use crate::role::{NewRole, Role};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use warden_common_core::{ActorId, PermissionId, RoleId, Timestamp};

#[derive(Default)]
struct State {
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    role_permission: Vec<(RoleId, PermissionId)>,
    role_user: Vec<(RoleId, ActorId, Timestamp)>,
}

impl State {
    fn hydrate_role(&self, role: &Role) -> Role {
        let mut role = role.clone();
        role.permissions = self
            .role_permission
            .iter()
            .filter(|(r, _)| *r == role.id)
            .filter_map(|(_, p)| self.permissions.iter().find(|perm| perm.id == *p))
            .map(Permission::without_roles)
            .collect();
        role
    }

    fn role_ids_of(&self, holder: Holder) -> Vec<RoleId> {
        match holder {
            Holder::Permission(pid) => self
                .role_permission
                .iter()
                .filter(|(_, p)| *p == pid)
                .map(|(r, _)| *r)
                .collect(),
            Holder::Actor(aid) => self
                .role_user
                .iter()
                .filter(|(_, a, _)| *a == aid)
                .map(|(r, _, _)| *r)
                .collect(),
        }
    }

    fn ensure_holder(&self, holder: Holder) -> AclResult<()> {
        if let Holder::Permission(pid) = holder {
            if !self.permissions.iter().any(|p| p.id == pid) {
                return Err(AclError::PermissionNotFound(pid.to_string()));
            }
        }
        Ok(())
    }

    fn ensure_role(&self, role: RoleId) -> AclResult<()> {
        if self.roles.iter().any(|r| r.id == role) {
            Ok(())
        } else {
            Err(AclError::RoleNotFound(role.to_string()))
        }
    }

    fn attach(&mut self, holder: Holder, role: RoleId) {
        match holder {
            Holder::Permission(pid) => self.role_permission.push((role, pid)),
            Holder::Actor(aid) => self.role_user.push((role, aid, Timestamp::now())),
        }
    }

    fn detach(&mut self, holder: Holder, role: Option<RoleId>) -> usize {
        let matches = |r: &RoleId| role.map_or(true, |target| *r == target);
        match holder {
            Holder::Permission(pid) => {
                let before = self.role_permission.len();
                self.role_permission.retain(|(r, p)| !(*p == pid && matches(r)));
                before - self.role_permission.len()
            }
            Holder::Actor(aid) => {
                let before = self.role_user.len();
                self.role_user.retain(|(r, a, _)| !(*a == aid && matches(r)));
                before - self.role_user.len()
            }
        }
    }
}

/// Store keeping every table in process memory.
///
/// Can be switched into an unavailable mode in which every call fails with
/// [`AclError::Store`], to exercise outage handling.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going down (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AclResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AclError::store("memory store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AclStore for MemoryStore {
    async fn insert_permissions(&self, permissions: Vec<NewPermission>) -> AclResult<Vec<Permission>> {
        self.check_available()?;
        let mut state = self.state.write();

        for (i, new) in permissions.iter().enumerate() {
            let taken = state.permissions.iter().any(|p| p.slug == new.slug)
                || permissions[..i].iter().any(|p| p.slug == new.slug);
            if taken {
                return Err(AclError::DuplicateSlug {
                    entity: EntityKind::Permission,
                    slug: new.slug.clone(),
                });
            }
        }

        let created: Vec<Permission> = permissions
            .into_iter()
            .map(NewPermission::into_permission)
            .collect();
        state.permissions.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_permission(&self, permission: &Permission) -> AclResult<Permission> {
        self.check_available()?;
        let mut state = self.state.write();

        if state
            .permissions
            .iter()
            .any(|p| p.slug == permission.slug && p.id != permission.id)
        {
            return Err(AclError::DuplicateSlug {
                entity: EntityKind::Permission,
                slug: permission.slug.clone(),
            });
        }

        let stored = state
            .permissions
            .iter_mut()
            .find(|p| p.id == permission.id)
            .ok_or_else(|| AclError::PermissionNotFound(permission.id.to_string()))?;

        stored.name = permission.name.clone();
        stored.slug = permission.slug.clone();
        stored.model = permission.model.clone();
        stored.updated_at = Timestamp::now();
        Ok(stored.clone())
    }

    async fn delete_permission(&self, id: PermissionId) -> AclResult<bool> {
        self.check_available()?;
        let mut state = self.state.write();

        let before = state.permissions.len();
        state.permissions.retain(|p| p.id != id);
        state.role_permission.retain(|(_, p)| *p != id);
        Ok(state.permissions.len() < before)
    }

    async fn find_permission(&self, id: PermissionId) -> AclResult<Option<Permission>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state.permissions.iter().find(|p| p.id == id).cloned())
    }

    async fn find_permission_by_slug(&self, slug: &str) -> AclResult<Option<Permission>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state.permissions.iter().find(|p| p.slug == slug).cloned())
    }

    async fn permissions_with_roles(&self) -> AclResult<Vec<Permission>> {
        self.check_available()?;
        let state = self.state.read();

        Ok(state
            .permissions
            .iter()
            .map(|permission| {
                let roles = state
                    .role_ids_of(Holder::Permission(permission.id))
                    .into_iter()
                    .filter_map(|rid| state.roles.iter().find(|r| r.id == rid))
                    .map(Role::without_permissions)
                    .collect();
                Permission {
                    roles: Some(roles),
                    ..permission.clone()
                }
            })
            .collect())
    }

    async fn insert_role(&self, role: NewRole) -> AclResult<Role> {
        self.check_available()?;
        let mut state = self.state.write();

        if state.roles.iter().any(|r| r.slug == role.slug) {
            return Err(AclError::DuplicateSlug {
                entity: EntityKind::Role,
                slug: role.slug,
            });
        }

        let role = role.into_role();
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, role: &Role) -> AclResult<Role> {
        self.check_available()?;
        let mut state = self.state.write();

        if state.roles.iter().any(|r| r.slug == role.slug && r.id != role.id) {
            return Err(AclError::DuplicateSlug {
                entity: EntityKind::Role,
                slug: role.slug.clone(),
            });
        }

        let stored = state
            .roles
            .iter_mut()
            .find(|r| r.id == role.id)
            .ok_or_else(|| AclError::RoleNotFound(role.id.to_string()))?;

        stored.name = role.name.clone();
        stored.slug = role.slug.clone();
        stored.description = role.description.clone();
        stored.system = role.system;
        stored.updated_at = Timestamp::now();
        let stored = stored.clone();

        Ok(state.hydrate_role(&stored))
    }

    async fn delete_role(&self, id: RoleId) -> AclResult<bool> {
        self.check_available()?;
        let mut state = self.state.write();

        let before = state.roles.len();
        state.roles.retain(|r| r.id != id);
        state.role_permission.retain(|(r, _)| *r != id);
        state.role_user.retain(|(r, _, _)| *r != id);
        Ok(state.roles.len() < before)
    }

    async fn find_role(&self, id: RoleId) -> AclResult<Option<Role>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state
            .roles
            .iter()
            .find(|r| r.id == id)
            .map(|r| state.hydrate_role(r)))
    }

    async fn find_role_by_slug(&self, slug: &str) -> AclResult<Option<Role>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state
            .roles
            .iter()
            .find(|r| r.slug == slug)
            .map(|r| state.hydrate_role(r)))
    }

    async fn roles(&self) -> AclResult<Vec<Role>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state.roles.iter().map(|r| state.hydrate_role(r)).collect())
    }

    async fn roles_of(&self, holder: Holder) -> AclResult<Vec<Role>> {
        self.check_available()?;
        let state = self.state.read();
        Ok(state
            .role_ids_of(holder)
            .into_iter()
            .filter_map(|rid| state.roles.iter().find(|r| r.id == rid))
            .map(|r| state.hydrate_role(r))
            .collect())
    }

    async fn attach_role(&self, holder: Holder, role: RoleId) -> AclResult<bool> {
        self.check_available()?;
        let mut state = self.state.write();

        state.ensure_holder(holder)?;
        state.ensure_role(role)?;
        if state.role_ids_of(holder).contains(&role) {
            return Ok(false);
        }

        state.attach(holder, role);
        Ok(true)
    }

    async fn detach_roles(&self, holder: Holder, role: Option<RoleId>) -> AclResult<usize> {
        self.check_available()?;
        Ok(self.state.write().detach(holder, role))
    }

    async fn sync_roles(&self, holder: Holder, roles: &[RoleId]) -> AclResult<SyncChanges<RoleId>> {
        self.check_available()?;
        let mut state = self.state.write();

        state.ensure_holder(holder)?;
        for role in roles {
            state.ensure_role(*role)?;
        }

        let changes = SyncChanges::diff(&state.role_ids_of(holder), roles);
        for role in &changes.detached {
            state.detach(holder, Some(*role));
        }
        for role in &changes.attached {
            state.attach(holder, *role);
        }
        Ok(changes)
    }

    async fn actors_having_roles(&self, roles: &[RoleId]) -> AclResult<Vec<ActorId>> {
        self.check_available()?;
        let state = self.state.read();

        let mut actors: Vec<ActorId> = Vec::new();
        for (role, actor, _) in &state.role_user {
            if roles.contains(role) && !actors.contains(actor) {
                actors.push(*actor);
            }
        }
        Ok(actors)
    }

    async fn actors_having_role_slugs(&self, slugs: &[&str]) -> AclResult<Vec<ActorId>> {
        let role_ids: Vec<RoleId> = {
            self.check_available()?;
            let state = self.state.read();
            state
                .roles
                .iter()
                .filter(|r| slugs.contains(&r.slug.as_str()))
                .map(|r| r.id)
                .collect()
        };
        self.actors_having_roles(&role_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::resource_permissions;

    #[tokio::test]
    async fn test_insert_permissions_rejects_duplicate_slugs_atomically() {
        let store = MemoryStore::new();
        store.insert_permissions(resource_permissions("Users")).await.unwrap();

        let mut batch = vec![NewPermission::new("export", "export-users")];
        batch.extend(resource_permissions("Users"));
        let err = store.insert_permissions(batch).await.unwrap_err();

        assert!(matches!(err, AclError::DuplicateSlug { entity: EntityKind::Permission, .. }));
        assert!(store.find_permission_by_slug("export-users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roles_are_loaded_with_permissions() {
        let store = MemoryStore::new();
        let permissions = store.insert_permissions(resource_permissions("Posts")).await.unwrap();
        let role = store.insert_role(NewRole::new("Editor", "editor")).await.unwrap();

        for permission in &permissions[..2] {
            store.attach_role(Holder::Permission(permission.id), role.id).await.unwrap();
        }

        let loaded = store.find_role_by_slug("editor").await.unwrap().unwrap();
        assert_eq!(loaded.permission_slugs(), vec!["viewAny-posts", "view-posts"]);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let store = MemoryStore::new();
        let role = store.insert_role(NewRole::new("Admin", "admin")).await.unwrap();
        let actor = Holder::Actor(ActorId::new());

        assert!(store.attach_role(actor, role.id).await.unwrap());
        assert!(!store.attach_role(actor, role.id).await.unwrap());
        assert_eq!(store.roles_of(actor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_attach_unknown_role_fails() {
        let store = MemoryStore::new();
        let err = store
            .attach_role(Holder::Actor(ActorId::new()), RoleId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AclError::RoleNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_role_detaches_everything() {
        let store = MemoryStore::new();
        let permission = store
            .insert_permissions(vec![NewPermission::new("create", "create-users")])
            .await
            .unwrap()
            .remove(0);
        let role = store.insert_role(NewRole::new("Admin", "admin")).await.unwrap();
        let actor = Holder::Actor(ActorId::new());

        store.attach_role(Holder::Permission(permission.id), role.id).await.unwrap();
        store.attach_role(actor, role.id).await.unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        assert!(store.roles_of(actor).await.unwrap().is_empty());
        let permissions = store.permissions_with_roles().await.unwrap();
        assert_eq!(permissions[0].roles.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_actor_scopes() {
        let store = MemoryStore::new();
        let admin = store.insert_role(NewRole::new("Admin", "admin")).await.unwrap();
        let editor = store.insert_role(NewRole::new("Editor", "editor")).await.unwrap();
        let (a, b, c) = (ActorId::new(), ActorId::new(), ActorId::new());

        store.attach_role(Holder::Actor(a), admin.id).await.unwrap();
        store.attach_role(Holder::Actor(b), editor.id).await.unwrap();
        store.attach_role(Holder::Actor(a), editor.id).await.unwrap();

        let by_id = store.actors_having_roles(&[editor.id]).await.unwrap();
        assert_eq!(by_id, vec![b, a]);

        let by_slug = store.actors_having_role_slugs(&["admin"]).await.unwrap();
        assert_eq!(by_slug, vec![a]);
        assert!(!by_slug.contains(&c));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = store.permissions_with_roles().await.unwrap_err();
        assert!(err.is_unavailable());

        store.set_unavailable(false);
        assert!(store.permissions_with_roles().await.unwrap().is_empty());
    }
}
