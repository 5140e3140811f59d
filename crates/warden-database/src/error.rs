use crate::pool::PoolError;
use thiserror::Error;
use warden_acl::AclError;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("schema bootstrap failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("invalid table name '{0}': use letters, digits and underscores")]
    InvalidTableName(String),

    #[error("table name '{0}' is reserved")]
    ReservedTableName(String),
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Backend failure surfaced through the store port.
pub(crate) fn store_err(err: sqlx::Error) -> AclError {
    AclError::store(err.to_string())
}
