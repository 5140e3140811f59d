//! Role entity.

use crate::permission::Permission;
use serde::{Deserialize, Serialize};
use warden_common_core::{RoleId, Timestamp};

/// Slug of the role consulted for unauthenticated callers.
pub const GUEST_ROLE: &str = "guest";

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Unique key.
    pub slug: String,
    pub description: Option<String>,
    /// Built-in roles refuse deletion.
    #[serde(default)]
    pub system: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Permissions granted by this role, loaded with the role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Slugs of every permission this role grants.
    pub fn permission_slugs(&self) -> Vec<&str> {
        self.permissions.iter().map(|p| p.slug.as_str()).collect()
    }

    /// True iff this role grants at least one of `required`.
    pub fn can_at_least(&self, required: &[&str]) -> bool {
        self.permissions
            .iter()
            .any(|p| required.iter().any(|r| *r == p.slug))
    }

    pub fn is_guest(&self) -> bool {
        self.slug == GUEST_ROLE
    }

    /// Copy without the permission relation, as stored inside a loaded permission.
    pub fn without_permissions(&self) -> Self {
        Self {
            permissions: Vec::new(),
            ..self.clone()
        }
    }
}

/// Attributes for a role that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub system: bool,
}

impl NewRole {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            description: None,
            system: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Materialize with a fresh id and timestamps.
    pub fn into_role(self) -> Role {
        let now = Timestamp::now();
        Role {
            id: RoleId::new(),
            name: self.name,
            slug: self.slug,
            description: self.description,
            system: self.system,
            created_at: now,
            updated_at: now,
            permissions: Vec::new(),
        }
    }
}
