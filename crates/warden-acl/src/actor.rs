//! Role-holding capabilities for actors and permissions.

use crate::permission::Permission;
use crate::role::Role;
use serde::{Deserialize, Serialize};
use warden_common_core::{ActorId, PermissionId};

/// Relation field used by [`Authorizable::owns`].
pub const DEFAULT_OWNER_FIELD: &str = "user_id";

/// The side of a role relation: a permission (`role_permission`) or an actor (`role_user`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Holder {
    Permission(PermissionId),
    Actor(ActorId),
}

impl Holder {
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission(_))
    }
}

/// Read access to an entity's assigned roles.
pub trait HasRoles: Send + Sync {
    /// Loaded roles, or `None` when the relation was never loaded.
    fn roles(&self) -> Option<&[Role]>;

    /// Slugs of the assigned roles. `None` distinguishes "not loaded" from "no roles".
    fn role_slugs(&self) -> Option<Vec<&str>> {
        self.roles()
            .map(|roles| roles.iter().map(|r| r.slug.as_str()).collect())
    }

    /// True iff a role with exactly this slug is assigned.
    fn has_role_slug(&self, slug: &str) -> bool {
        self.roles()
            .map_or(false, |roles| roles.iter().any(|r| r.slug == slug))
    }

    /// True iff any of `slugs` is assigned.
    fn has_any_role_slug(&self, slugs: &[&str]) -> bool {
        slugs.iter().any(|slug| self.has_role_slug(slug))
    }

    /// True iff any of `roles` (by id) is assigned.
    fn has_any_role(&self, roles: &[Role]) -> bool {
        self.roles().map_or(false, |assigned| {
            roles.iter().any(|r| assigned.iter().any(|a| a.id == r.id))
        })
    }

    /// Case-insensitive slug match against the assigned roles.
    fn is_role(&self, slug: &str) -> bool {
        let slug = slug.to_lowercase();
        self.roles()
            .map_or(false, |roles| roles.iter().any(|r| r.slug == slug))
    }
}

/// Entities whose roles can be mutated through [`crate::RoleAssignments`].
pub trait RoleHolder: HasRoles {
    fn holder(&self) -> Holder;

    /// Replace the loaded role relation.
    fn set_roles(&mut self, roles: Vec<Role>);
}

/// Entities that record an owning actor under a named relation field.
pub trait Owned {
    /// Value of the relation field, when it holds an actor key.
    fn owner_key(&self, relation: &str) -> Option<ActorId>;
}

/// The authorization capability of an actor.
pub trait Authorizable: HasRoles {
    /// The actor's own key.
    fn key(&self) -> ActorId;

    /// Permission slugs across every assigned role, concatenated without deduplication.
    fn permission_slugs(&self) -> Vec<&str> {
        self.roles()
            .unwrap_or_default()
            .iter()
            .flat_map(|role| role.permission_slugs())
            .collect()
    }

    /// True iff any single assigned role grants one of `required`.
    fn can_at_least(&self, required: &[&str]) -> bool {
        self.roles()
            .map_or(false, |roles| roles.iter().any(|role| role.can_at_least(required)))
    }

    /// Permission path OR role path.
    fn can_access(&self, required: &[&str]) -> bool {
        self.can_at_least(required) || self.has_any_role_slug(required)
    }

    fn has_permission(&self, slug: &str) -> bool {
        self.can_access(&[slug])
    }

    /// Whether `entity` names this actor in its `user_id` field.
    fn owns(&self, entity: &dyn Owned) -> bool {
        self.owns_via(entity, DEFAULT_OWNER_FIELD)
    }

    /// Whether `entity` names this actor in the `relation` field.
    fn owns_via(&self, entity: &dyn Owned, relation: &str) -> bool {
        entity.owner_key(relation) == Some(self.key())
    }
}

impl HasRoles for Permission {
    fn roles(&self) -> Option<&[Role]> {
        self.roles.as_deref()
    }
}

impl RoleHolder for Permission {
    fn holder(&self) -> Holder {
        Holder::Permission(self.id)
    }

    fn set_roles(&mut self, roles: Vec<Role>) {
        self.roles = Some(roles);
    }
}

/// A minimal actor record: an id, a display name and the loaded roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
}

impl Actor {
    /// A new actor whose roles are loaded and empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ActorId::new(), name)
    }

    pub fn with_id(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: Some(Vec::new()),
        }
    }

    /// An actor whose role relation has not been loaded.
    pub fn unloaded(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: None,
        }
    }
}

impl HasRoles for Actor {
    fn roles(&self) -> Option<&[Role]> {
        self.roles.as_deref()
    }
}

impl RoleHolder for Actor {
    fn holder(&self) -> Holder {
        Holder::Actor(self.id)
    }

    fn set_roles(&mut self, roles: Vec<Role>) {
        self.roles = Some(roles);
    }
}

impl Authorizable for Actor {
    fn key(&self) -> ActorId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::NewPermission;
    use crate::role::NewRole;

    fn role(slug: &str, permissions: &[&str]) -> Role {
        let mut role = NewRole::new(slug, slug).into_role();
        role.permissions = permissions
            .iter()
            .map(|s| NewPermission::new(*s, *s).into_permission())
            .collect();
        role
    }

    fn actor_with(roles: Vec<Role>) -> Actor {
        let mut actor = Actor::new("ada");
        actor.set_roles(roles);
        actor
    }

    struct Post {
        user_id: Option<ActorId>,
        editor_id: Option<ActorId>,
    }

    impl Owned for Post {
        fn owner_key(&self, relation: &str) -> Option<ActorId> {
            match relation {
                "user_id" => self.user_id,
                "editor_id" => self.editor_id,
                _ => None,
            }
        }
    }

    #[test]
    fn test_can_at_least_is_or_over_roles() {
        let actor = actor_with(vec![role("a", &["read"]), role("b", &["publish"])]);

        assert!(actor.can_at_least(&["publish"]));
        assert!(actor.can_at_least(&["read"]));
        assert!(!actor.can_at_least(&["delete"]));
    }

    #[test]
    fn test_can_access_accepts_role_slugs() {
        let actor = actor_with(vec![role("admin", &[])]);

        assert!(actor.can_access(&["admin"]));
        assert!(actor.can_access(&["delete-users", "admin"]));
        assert!(!actor.can_access(&["delete-users"]));
    }

    #[test]
    fn test_permission_slugs_concatenate_without_dedup() {
        let actor = actor_with(vec![
            role("a", &["view-users", "create-users"]),
            role("b", &["view-users"]),
        ]);

        let mut slugs = actor.permission_slugs();
        slugs.sort_unstable();
        assert_eq!(slugs, vec!["create-users", "view-users", "view-users"]);
    }

    #[test]
    fn test_role_slugs_distinguish_unloaded_from_empty() {
        let unloaded = Actor::unloaded(ActorId::new(), "ghost");
        assert_eq!(unloaded.role_slugs(), None);
        assert!(!unloaded.can_at_least(&["anything"]));
        assert!(unloaded.permission_slugs().is_empty());

        let empty = Actor::new("blank");
        assert_eq!(empty.role_slugs(), Some(Vec::new()));
    }

    #[test]
    fn test_role_queries() {
        let admin = role("admin", &[]);
        let editor = role("editor", &[]);
        let actor = actor_with(vec![admin.clone()]);

        assert!(actor.has_role_slug("admin"));
        assert!(!actor.has_role_slug("Admin"));
        assert!(actor.has_any_role_slug(&["editor", "admin"]));
        assert!(!actor.has_any_role_slug(&["editor"]));
        assert!(actor.has_any_role(&[editor.clone(), admin]));
        assert!(!actor.has_any_role(&[editor]));
    }

    #[test]
    fn test_is_role_is_case_insensitive() {
        let actor = actor_with(vec![role("moderator", &[])]);
        assert!(actor.is_role("Moderator"));
        assert!(actor.is_role("MODERATOR"));
        assert!(!actor.is_role("admin"));
    }

    #[test]
    fn test_has_permission_single_slug() {
        let actor = actor_with(vec![role("writer", &["create-posts"])]);
        assert!(actor.has_permission("create-posts"));
        assert!(!actor.has_permission("delete-posts"));
    }

    #[test]
    fn test_owns_compares_relation_value() {
        let actor = Actor::new("owner");
        let other = ActorId::new();

        let post = Post {
            user_id: Some(actor.id),
            editor_id: Some(other),
        };

        assert!(actor.owns(&post));
        assert!(!actor.owns_via(&post, "editor_id"));
        assert!(!actor.owns_via(&post, "missing_field"));
    }
}
