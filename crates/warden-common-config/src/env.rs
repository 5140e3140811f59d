//! Environment variable handling.

use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    pub const WARDEN_CONFIG_PATH: &str = "WARDEN_CONFIG_PATH";
    pub const WARDEN_ACL_CACHE_ENABLED: &str = "WARDEN_ACL_CACHE_ENABLED";
    pub const WARDEN_ACL_CACHE_KEY: &str = "WARDEN_ACL_CACHE_KEY";
    pub const WARDEN_DATABASE_PATH: &str = "WARDEN_DATABASE_PATH";
    pub const WARDEN_REDIS_URL: &str = "WARDEN_REDIS_URL";
    pub const WARDEN_ENV: &str = "WARDEN_ENV";
}

/// Environment configuration.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files.
    pub fn init() -> Result<Self, EnvError> {
        // Later files override earlier ones.
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::WARDEN_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_default() {
        assert_eq!(Environment::get_or("WARDEN_NONEXISTENT_12345", "default"), "default");
    }

    #[test]
    fn test_require_missing() {
        match Environment::require("WARDEN_NONEXISTENT_REQUIRED") {
            Err(EnvError::NotSet { var }) => assert_eq!(var, "WARDEN_NONEXISTENT_REQUIRED"),
            other => panic!("Expected NotSet, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_init() {
        assert!(Environment::init().is_ok());
    }
}
