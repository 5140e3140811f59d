//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use warden_acl::ActorId;
use warden_common_config::{apply_env_overrides, validate, ConfigLoader, WardenConfig};

use crate::error::CliError;
use crate::output::OutputFormat;

/// Warden - role-based access control administration
///
/// Manage roles, permissions and role assignments, and check access.
#[derive(Debug, Parser)]
#[command(
    name = "warden",
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a configuration file (default: `.warden/config.yaml`)
    #[arg(short, long, global = true, env = "WARDEN_CONFIG_PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// SQLite database path; overrides `database.path`
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub database: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage permissions
    #[command(subcommand)]
    Permission(PermissionCommand),

    /// Manage roles and the permissions they grant
    #[command(subcommand)]
    Role(RoleCommand),

    /// Manage actor role assignments
    #[command(subcommand)]
    Actor(ActorCommand),

    /// Check whether an actor may perform any of the given permissions
    Check(CheckArgs),

    /// List the abilities registered for the stored permissions
    Abilities,

    /// Write the effective configuration to `.warden/config.yaml`
    Init,
}

#[derive(Debug, Subcommand)]
pub enum PermissionCommand {
    /// Create the five standard permissions for a resource
    CreateResource {
        /// Resource name, e.g. `Users`
        resource: String,
    },

    /// Create a single permission
    Create {
        slug: String,
        /// Display name (defaults to the slug)
        #[arg(long)]
        name: Option<String>,
        /// Classification, e.g. the resource name
        #[arg(long)]
        model: Option<String>,
    },

    /// List permissions
    List,

    /// Delete a permission
    Delete { slug: String },

    /// List the roles granting a permission
    Roles { slug: String },
}

#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    /// Create a role
    Create {
        slug: String,
        /// Display name (defaults to the slug)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Protect the role from deletion
        #[arg(long)]
        system: bool,
    },

    /// List roles with their permissions
    List,

    /// Delete a role and all of its associations
    Delete { slug: String },

    /// Grant permissions to a role
    Grant {
        role: String,
        #[arg(required = true)]
        permissions: Vec<String>,
    },

    /// Revoke permissions from a role
    Revoke {
        role: String,
        #[arg(required = true)]
        permissions: Vec<String>,
    },

    /// Make a role grant exactly the given permissions
    Sync { role: String, permissions: Vec<String> },
}

#[derive(Debug, Subcommand)]
pub enum ActorCommand {
    /// Print a fresh actor id
    New,

    /// Assign roles to an actor
    Assign {
        actor: ActorId,
        #[arg(required = true)]
        roles: Vec<String>,
    },

    /// Revoke roles from an actor
    Revoke {
        actor: ActorId,
        #[arg(required = true)]
        roles: Vec<String>,
    },

    /// Revoke every role from an actor
    RevokeAll { actor: ActorId },

    /// Give an actor exactly the given roles
    Sync { actor: ActorId, roles: Vec<String> },

    /// List an actor's roles
    Roles { actor: ActorId },

    /// List actors holding any of the given roles
    List {
        #[arg(required = true)]
        roles: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Permission slugs; any one suffices
    #[arg(required = true)]
    pub permissions: Vec<String>,

    /// Actor to check; omitted means an unauthenticated guest
    #[arg(long)]
    pub actor: Option<ActorId>,

    /// Only consider permissions, not role slugs
    #[arg(long)]
    pub at_least: bool,
}

impl Cli {
    /// Load configuration from `--config`, or `.warden/config.yaml` in the current directory.
    pub fn load_config(&self) -> Result<WardenConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                let loader = ConfigLoader::new(path.parent().unwrap_or_else(|| std::path::Path::new(".")));
                let mut config = loader.load_file(path)?;
                apply_env_overrides(&mut config)?;
                validate(&config)?;
                config
            }
            None => ConfigLoader::default().load()?,
        };

        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check() {
        let actor = ActorId::new();
        let cli = Cli::try_parse_from([
            "warden",
            "--format",
            "json",
            "check",
            "view-posts",
            "edit-posts",
            "--actor",
            &actor.to_string(),
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.permissions, vec!["view-posts", "edit-posts"]);
        assert_eq!(args.actor, Some(actor));
        assert!(!args.at_least);
    }

    #[test]
    fn test_rejects_malformed_actor_id() {
        assert!(Cli::try_parse_from(["warden", "actor", "roles", "not-an-id"]).is_err());
    }

    #[test]
    fn test_grant_requires_permissions() {
        assert!(Cli::try_parse_from(["warden", "role", "grant", "editor"]).is_err());
        assert!(Cli::try_parse_from(["warden", "role", "sync", "editor"]).is_ok());
    }

    #[test]
    fn test_database_flag_overrides_config() {
        let (_dir, path) = warden_test_utils::temp_config("database:\n  path: from-file.db\n");
        let cli = Cli::try_parse_from([
            "warden",
            "--config",
            path.to_str().unwrap(),
            "--database",
            "override.db",
            "abilities",
        ])
        .unwrap();

        assert_eq!(cli.load_config().unwrap().database.path, "override.db");
    }
}
