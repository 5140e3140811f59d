//! Configuration types for Warden.
//!
//! Settings live under the `acl` section of `.warden/config.yaml`:
//! `acl.cache.enabled`, `acl.cache.key`, `acl.permission` and `acl.role`.
//! `WARDEN_*` environment variables override file values.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_sensible_values() {
        let config = WardenConfig::default();

        assert!(config.acl.cache.enabled);
        assert_eq!(config.acl.cache.key, "permissions.policies");
        assert_eq!(config.acl.permission, "permissions");
        assert_eq!(config.acl.role, "roles");
        assert_eq!(config.database.path, "warden.db");
    }

    #[test]
    fn test_partial_configs_merge_with_defaults() {
        let partial_yaml = r#"
acl:
  cache:
    key: custom.policies
"#;

        let config: WardenConfig = serde_yaml::from_str(partial_yaml).unwrap();

        assert_eq!(config.acl.cache.key, "custom.policies");
        assert!(config.acl.cache.enabled);
        assert_eq!(config.acl.role, "roles");
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&WardenConfig::default()).unwrap();

        assert!(yaml.contains("acl:"));
        assert!(yaml.contains("key: permissions.policies"));
        assert!(yaml.contains("enabled: true"));
    }

    #[test]
    fn test_env_overrides_cache_settings() {
        std::env::set_var(vars::WARDEN_ACL_CACHE_ENABLED, "0");
        std::env::set_var(vars::WARDEN_ACL_CACHE_KEY, "env.policies");

        let mut config = WardenConfig::default();
        apply_env_overrides(&mut config).unwrap();

        std::env::remove_var(vars::WARDEN_ACL_CACHE_ENABLED);
        std::env::remove_var(vars::WARDEN_ACL_CACHE_KEY);

        assert!(!config.acl.cache.enabled);
        assert_eq!(config.acl.cache.key, "env.policies");
    }
}
