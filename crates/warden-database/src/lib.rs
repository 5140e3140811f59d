//! SQLite persistence for Warden.
//!
//! [`SqliteStore`] implements the [`warden_acl::AclStore`] port on a `sqlx`
//! pool. Tables are created on open; there is no migration tooling.

pub mod error;
pub mod pool;
pub mod schema;
pub mod store;

pub use error::DatabaseError;
pub use pool::{DatabasePool, PoolConfig, PoolError, MEMORY_PATH};
pub use schema::{bootstrap, TableNames, ROLE_PERMISSION_TABLE, ROLE_USER_TABLE};
pub use store::SqliteStore;
