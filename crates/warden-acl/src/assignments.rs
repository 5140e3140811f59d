//! Role assignment for any [`RoleHolder`]: actors and permissions alike.

use crate::actor::RoleHolder;
use crate::cache::PermissionCache;
use crate::error::{AclError, AclResult};
use crate::role::Role;
use crate::store::{AclStore, SyncChanges};
use std::sync::Arc;
use tracing::debug;
use warden_common_core::{ActorId, RoleId};

/// Attaches, revokes and syncs roles, then refreshes the holder's loaded roles.
///
/// Changes to a permission's roles also drop the permission snapshot cache.
#[derive(Clone)]
pub struct RoleAssignments {
    store: Arc<dyn AclStore>,
    cache: PermissionCache,
}

impl RoleAssignments {
    pub fn new(store: Arc<dyn AclStore>, cache: PermissionCache) -> Self {
        Self { store, cache }
    }

    /// Load the holder's roles from the store.
    pub async fn load_roles<H: RoleHolder>(&self, holder: &mut H) -> AclResult<()> {
        let roles = self.store.roles_of(holder.holder()).await?;
        holder.set_roles(roles);
        Ok(())
    }

    /// Attach `role` unless already attached. Returns whether anything changed.
    pub async fn assign_role<H: RoleHolder>(&self, holder: &mut H, role: RoleId) -> AclResult<bool> {
        if holder.roles().is_none() {
            self.load_roles(holder).await?;
        }
        if holder.roles().map_or(false, |roles| roles.iter().any(|r| r.id == role)) {
            return Ok(false);
        }

        let attached = self.store.attach_role(holder.holder(), role).await?;
        self.finish(holder).await?;
        debug!(holder = ?holder.holder(), %role, attached, "role assigned");
        Ok(attached)
    }

    pub async fn attach_role<H: RoleHolder>(&self, holder: &mut H, role: &Role) -> AclResult<bool> {
        self.assign_role(holder, role.id).await
    }

    /// Resolve the slug, then attach. Unknown slugs fail with [`AclError::RoleNotFound`].
    pub async fn attach_role_by_slug<H: RoleHolder>(&self, holder: &mut H, slug: &str) -> AclResult<bool> {
        let role = self.require_role(slug).await?;
        self.assign_role(holder, role.id).await
    }

    pub async fn revoke_role<H: RoleHolder>(&self, holder: &mut H, role: &Role) -> AclResult<bool> {
        let removed = self.store.detach_roles(holder.holder(), Some(role.id)).await?;
        self.finish(holder).await?;
        Ok(removed > 0)
    }

    pub async fn revoke_role_by_slug<H: RoleHolder>(&self, holder: &mut H, slug: &str) -> AclResult<bool> {
        let role = self.require_role(slug).await?;
        self.revoke_role(holder, &role).await
    }

    /// Detach every role. Returns how many were detached.
    pub async fn revoke_all_roles<H: RoleHolder>(&self, holder: &mut H) -> AclResult<usize> {
        let removed = self.store.detach_roles(holder.holder(), None).await?;
        self.finish(holder).await?;
        Ok(removed)
    }

    /// Replace the holder's roles with exactly `roles`.
    pub async fn sync_roles<H: RoleHolder>(
        &self,
        holder: &mut H,
        roles: &[RoleId],
    ) -> AclResult<SyncChanges<RoleId>> {
        let changes = self.store.sync_roles(holder.holder(), roles).await?;
        self.finish(holder).await?;
        Ok(changes)
    }

    /// Actors holding any of the given roles.
    pub async fn actors_having_roles(&self, roles: &[RoleId]) -> AclResult<Vec<ActorId>> {
        self.store.actors_having_roles(roles).await
    }

    /// Actors holding a role with any of the given slugs.
    pub async fn actors_having_role_slugs(&self, slugs: &[&str]) -> AclResult<Vec<ActorId>> {
        self.store.actors_having_role_slugs(slugs).await
    }

    async fn require_role(&self, slug: &str) -> AclResult<Role> {
        self.store
            .find_role_by_slug(slug)
            .await?
            .ok_or_else(|| AclError::RoleNotFound(slug.to_string()))
    }

    async fn finish<H: RoleHolder>(&self, holder: &mut H) -> AclResult<()> {
        if holder.holder().is_permission() {
            self.cache.rebuild(self.store.as_ref()).await;
        }
        self.load_roles(holder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Authorizable, HasRoles};
    use crate::cache::InMemoryCache;
    use crate::catalog::{PermissionCatalog, RoleCatalog};
    use crate::role::NewRole;
    use crate::store::MemoryStore;
    use warden_common_config::CacheConfig;

    struct Fixture {
        cache: PermissionCache,
        permissions: PermissionCatalog,
        roles: RoleCatalog,
        assignments: RoleAssignments,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn AclStore> = Arc::new(MemoryStore::new());
        let cache = PermissionCache::new(Arc::new(InMemoryCache::new()), CacheConfig::default());
        Fixture {
            permissions: PermissionCatalog::new(store.clone(), cache.clone()),
            roles: RoleCatalog::new(store.clone(), cache.clone()),
            assignments: RoleAssignments::new(store, cache.clone()),
            cache,
        }
    }

    #[tokio::test]
    async fn test_permission_role_interactions() {
        let f = fixture();
        let admin = f.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        let user = f.roles.create(NewRole::new("User", "user")).await.unwrap();
        f.roles.create(NewRole::new("Registered", "registered")).await.unwrap();

        let mut permission = f.permissions.create_resource("Users").await.unwrap().remove(0);

        f.assignments.attach_role(&mut permission, &admin).await.unwrap();
        assert!(permission.has_role_slug("admin"));

        f.assignments.attach_role(&mut permission, &user).await.unwrap();
        assert!(permission.has_role_slug("user"));

        f.assignments.attach_role_by_slug(&mut permission, "registered").await.unwrap();
        assert!(permission.has_role_slug("registered"));

        f.assignments.revoke_role(&mut permission, &user).await.unwrap();
        assert!(!permission.has_role_slug("user"));

        f.assignments.revoke_role_by_slug(&mut permission, "registered").await.unwrap();
        assert!(!permission.has_role_slug("registered"));

        f.assignments.revoke_all_roles(&mut permission).await.unwrap();
        assert_eq!(permission.roles().map(<[Role]>::len), Some(0));

        f.assignments.sync_roles(&mut permission, &[admin.id]).await.unwrap();
        assert_eq!(permission.roles().map(<[Role]>::len), Some(1));
    }

    #[tokio::test]
    async fn test_sync_roles_leaves_exactly_the_given_set() {
        let f = fixture();
        let a = f.roles.create(NewRole::new("A", "a")).await.unwrap();
        let b = f.roles.create(NewRole::new("B", "b")).await.unwrap();
        let c = f.roles.create(NewRole::new("C", "c")).await.unwrap();
        let mut actor = Actor::new("ada");

        f.assignments.sync_roles(&mut actor, &[a.id, b.id]).await.unwrap();
        let changes = f.assignments.sync_roles(&mut actor, &[c.id]).await.unwrap();

        assert_eq!(changes.attached, vec![c.id]);
        assert_eq!(changes.detached.len(), 2);
        assert_eq!(actor.role_slugs(), Some(vec!["c"]));
    }

    #[tokio::test]
    async fn test_assign_role_is_idempotent() {
        let f = fixture();
        let admin = f.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        let mut actor = Actor::new("ada");

        assert!(f.assignments.assign_role(&mut actor, admin.id).await.unwrap());
        assert!(!f.assignments.assign_role(&mut actor, admin.id).await.unwrap());
        assert_eq!(actor.role_slugs(), Some(vec!["admin"]));
    }

    #[tokio::test]
    async fn test_assign_role_loads_unloaded_relation_first() {
        let f = fixture();
        let admin = f.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        let mut actor = Actor::new("ada");
        f.assignments.assign_role(&mut actor, admin.id).await.unwrap();

        let mut reloaded = Actor::unloaded(actor.id, "ada");
        assert!(!f.assignments.assign_role(&mut reloaded, admin.id).await.unwrap());
        assert_eq!(reloaded.role_slugs(), Some(vec!["admin"]));
    }

    #[tokio::test]
    async fn test_attach_unknown_slug_is_role_not_found() {
        let f = fixture();
        let mut actor = Actor::new("ada");

        let err = f.assignments.attach_role_by_slug(&mut actor, "ghost").await.unwrap_err();
        assert!(matches!(err, AclError::RoleNotFound(slug) if slug == "ghost"));
    }

    #[tokio::test]
    async fn test_actor_gains_access_through_role() {
        let f = fixture();
        f.permissions.create_resource("Users").await.unwrap();
        let mut admin = f.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        f.roles.grant_permission_by_slug(&mut admin, "delete-users").await.unwrap();

        let mut actor = Actor::new("ada");
        assert!(!actor.can_access(&["delete-users"]));

        f.assignments.attach_role(&mut actor, &admin).await.unwrap();
        assert!(actor.can_access(&["delete-users"]));
        assert!(actor.is_role("ADMIN"));
    }

    #[tokio::test]
    async fn test_actor_changes_keep_cache_but_permission_changes_rebuild_it() {
        let f = fixture();
        let admin = f.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        let mut permission = f.permissions.create_resource("Users").await.unwrap().remove(0);
        let mut actor = Actor::new("ada");

        f.cache.invalidate().await;
        f.cache.remember(|| async { Ok(Vec::new()) }).await.unwrap();
        f.assignments.attach_role(&mut actor, &admin).await.unwrap();
        assert_eq!(f.cache.cached().await.unwrap(), Some(Vec::new()));

        f.assignments.attach_role(&mut permission, &admin).await.unwrap();
        let cached = f.cache.cached().await.unwrap().unwrap();
        assert_eq!(cached.len(), 5);
        assert_eq!(cached[0].role_slugs(), Some(vec!["admin"]));
    }

    #[tokio::test]
    async fn test_scopes_through_assignments() {
        let f = fixture();
        let admin = f.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        let mut ada = Actor::new("ada");
        let bob = Actor::new("bob");
        f.assignments.attach_role(&mut ada, &admin).await.unwrap();

        assert_eq!(f.assignments.actors_having_roles(&[admin.id]).await.unwrap(), vec![ada.id]);
        let by_slug = f.assignments.actors_having_role_slugs(&["admin"]).await.unwrap();
        assert!(!by_slug.contains(&bob.id));
    }
}
