//! Configuration file loading and parsing.

use crate::env::{vars, Environment};
use crate::types::WardenConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the project config file.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(".warden/config.yaml")
    }

    /// Load configuration from `.warden/config.yaml`, then apply env overrides.
    pub fn load(&self) -> Result<WardenConfig, ConfigError> {
        let config_path = self.config_path();

        let mut config = if config_path.exists() {
            self.load_file(&config_path)?
        } else {
            WardenConfig::default()
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;
        Ok(config)
    }

    /// Load an explicit config file. Missing files are an error here.
    pub fn load_file(&self, path: &Path) -> Result<WardenConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let expanded = self.expand_env_vars(&contents)?;

        let config: WardenConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Save configuration to file.
    pub fn save(&self, config: &WardenConfig) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(".warden");
        std::fs::create_dir_all(&config_dir)?;

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(self.config_path(), yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

/// Apply `WARDEN_*` environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut WardenConfig) -> Result<(), ConfigError> {
    if let Some(raw) = Environment::get(vars::WARDEN_ACL_CACHE_ENABLED) {
        config.acl.cache.enabled = match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                return Err(ConfigError::ValidationError {
                    message: format!("{} must be a boolean, got '{raw}'", vars::WARDEN_ACL_CACHE_ENABLED),
                })
            }
        };
    }

    if let Some(key) = Environment::get(vars::WARDEN_ACL_CACHE_KEY) {
        config.acl.cache.key = key;
    }

    if let Some(path) = Environment::get(vars::WARDEN_DATABASE_PATH) {
        config.database.path = path;
    }

    Ok(())
}

/// Validate configuration values.
pub fn validate(config: &WardenConfig) -> Result<(), ConfigError> {
    if config.acl.cache.key.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: "acl.cache.key must not be empty".to_string(),
        });
    }

    // Entity identifiers end up as table names.
    let ident = regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    for (field, value) in [("acl.permission", &config.acl.permission), ("acl.role", &config.acl.role)] {
        if !ident.is_match(value) {
            return Err(ConfigError::ValidationError {
                message: format!("{field} must be a plain identifier, got '{value}'"),
            });
        }
    }

    if config.acl.permission == config.acl.role {
        return Err(ConfigError::ValidationError {
            message: "acl.permission and acl.role must differ".to_string(),
        });
    }

    Ok(())
}
