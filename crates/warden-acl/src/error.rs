//! Access control errors.

use std::fmt;
use thiserror::Error;

/// Entity kind, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Role,
    Permission,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => f.write_str("role"),
            Self::Permission => f.write_str("permission"),
        }
    }
}

/// Errors raised by stores, caches and the role/permission services.
#[derive(Debug, Error)]
pub enum AclError {
    /// A write collided with the unique slug constraint.
    #[error("{entity} slug already exists: {slug}")]
    DuplicateSlug { entity: EntityKind, slug: String },

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("permission not found: {0}")]
    PermissionNotFound(String),

    #[error("role '{0}' is a system role and cannot be deleted")]
    ProtectedRole(String),

    /// Persistence store failure (connection, query, constraint other than slug).
    #[error("store error: {0}")]
    Store(String),

    /// Cache store failure.
    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AclError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Whether this error was caused by an unavailable backend rather than by the caller.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Cache(_))
    }
}

/// Result alias for access control operations.
pub type AclResult<T> = Result<T, AclError>;
