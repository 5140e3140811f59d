//! CLI error type and exit codes.

use std::process::ExitCode;
use thiserror::Error;
use warden_acl::AclError;
use warden_common_config::ConfigError;
use warden_database::DatabaseError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Acl(#[from] AclError),

    #[error("{resource_type} not found: {name}")]
    NotFound {
        resource_type: &'static str,
        name: String,
    },

    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The checked actor lacks the permission. Carries the rendered decision.
    #[error("access denied")]
    Denied { output: String },

    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn not_found(resource_type: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            name: name.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E001",
            Self::Database(_) => "E002",
            Self::Acl(e) if e.is_unavailable() => "E002",
            Self::Validation { .. } | Self::Acl(AclError::DuplicateSlug { .. } | AclError::ProtectedRole(_)) => "E004",
            Self::NotFound { .. } | Self::Acl(AclError::RoleNotFound(_) | AclError::PermissionNotFound(_)) => "E005",
            Self::Denied { .. } => "E006",
            Self::Acl(_) | Self::Output(_) | Self::Other(_) => "E999",
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        let code = match self.code() {
            "E001" => 2,
            "E002" => 3,
            "E004" => 5,
            "E005" => 6,
            "E006" => 7,
            _ => 1,
        };
        ExitCode::from(code)
    }
}
