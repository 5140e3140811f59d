//! Role-based access control core.
//!
//! Permissions are granted to roles; actors hold roles. An actor can do
//! whatever any of its roles can do. This crate provides:
//!
//! - the [`Permission`] and [`Role`] entities and their creation rules
//! - the [`HasRoles`] / [`Authorizable`] capabilities for actors
//! - the [`AclStore`] port with an in-memory implementation
//! - the [`PermissionCache`] snapshot used by the gate registrar
//! - management services ([`PermissionCatalog`], [`RoleCatalog`], [`RoleAssignments`])
//! - [`AccessResolver`] for guest-aware checks

pub mod actor;
pub mod assignments;
pub mod audit;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod permission;
pub mod resolver;
pub mod role;
pub mod store;

pub use actor::{Actor, Authorizable, HasRoles, Holder, Owned, RoleHolder, DEFAULT_OWNER_FIELD};
pub use assignments::RoleAssignments;
pub use audit::{log_authz, AuthzAuditEvent};
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use cache::{remember_forever, CacheStore, InMemoryCache, PermissionCache, PermissionListener};
pub use catalog::{PermissionCatalog, RoleCatalog};
pub use error::{AclError, AclResult, EntityKind};
pub use permission::{
    resource_permissions, NewPermission, Permission, CONTROLLER_ACTION_DELIMITER, RESOURCE_ACTIONS,
};
pub use resolver::{AccessResolver, Caller};
pub use role::{NewRole, Role, GUEST_ROLE};
pub use store::{AclStore, MemoryStore, SyncChanges};

pub use warden_common_core::{ActorId, PermissionId, RoleId};
