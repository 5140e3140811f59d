//! Permission entity.

use crate::role::Role;
use serde::{Deserialize, Serialize};
use warden_common_core::{PermissionId, Timestamp};

/// Delimiter marking a slug as a `Controller@method` delegation.
pub const CONTROLLER_ACTION_DELIMITER: char = '@';

/// Actions generated for every resource by [`resource_permissions`].
pub const RESOURCE_ACTIONS: [&str; 5] = ["viewAny", "view", "create", "update", "delete"];

/// A single grantable action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    /// Display name; also the ability name for controller-action permissions.
    pub name: String,
    /// Unique key. May encode `Controller@method`.
    pub slug: String,
    /// Free-form classification, e.g. the resource the permission belongs to.
    pub model: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Roles granting this permission; `None` until loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Role>>,
}

impl Permission {
    /// Whether the slug delegates to a controller action.
    pub fn is_controller_action(&self) -> bool {
        self.slug.contains(CONTROLLER_ACTION_DELIMITER)
    }

    /// Ability name this permission is registered under.
    pub fn ability(&self) -> &str {
        if self.is_controller_action() {
            &self.name
        } else {
            &self.slug
        }
    }

    /// Copy without the role relation, as stored inside a loaded role.
    pub fn without_roles(&self) -> Self {
        Self {
            roles: None,
            ..self.clone()
        }
    }
}

/// Attributes for a permission that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub slug: String,
    pub model: Option<String>,
}

impl NewPermission {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Materialize with a fresh id and timestamps.
    pub fn into_permission(self) -> Permission {
        let now = Timestamp::now();
        Permission {
            id: PermissionId::new(),
            name: self.name,
            slug: self.slug,
            model: self.model,
            created_at: now,
            updated_at: now,
            roles: None,
        }
    }
}

/// The standard permission set for a resource.
///
/// Produces one permission per entry of [`RESOURCE_ACTIONS`], slugged
/// `{action}-{lowercase resource}` and named after the action.
pub fn resource_permissions(resource: &str) -> Vec<NewPermission> {
    let suffix = resource.to_lowercase();
    RESOURCE_ACTIONS
        .iter()
        .map(|action| NewPermission::new(*action, format!("{action}-{suffix}")).with_model(resource))
        .collect()
}
