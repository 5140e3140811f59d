//! Command handlers. Each returns the rendered output.

use std::slice;
use std::sync::Arc;

use tracing::info;
use warden_acl::{Actor, ActorId, AclStore, Caller, HasRoles, NewPermission, NewRole};
use warden_common_config::{ConfigLoader, WardenConfig};
use warden_gate::GateRegistry;

use crate::cli::{ActorCommand, CheckArgs, Cli, Command, PermissionCommand, RoleCommand};
use crate::context::Context;
use crate::error::CliError;
use crate::output::Printer;

/// Load configuration, open the store and run the selected command.
pub async fn run(cli: Cli) -> Result<String, CliError> {
    let config = cli.load_config()?;
    let printer = Printer::new(cli.format);

    if matches!(cli.command, Command::Init) {
        return init(&config, &printer);
    }

    let ctx = Context::open(config, printer).await?;
    let result = execute(cli.command, &ctx).await;
    ctx.close().await;
    result
}

pub async fn execute(command: Command, ctx: &Context) -> Result<String, CliError> {
    match command {
        Command::Permission(cmd) => permission(cmd, ctx).await,
        Command::Role(cmd) => role(cmd, ctx).await,
        Command::Actor(cmd) => actor(cmd, ctx).await,
        Command::Check(args) => check(args, ctx).await,
        Command::Abilities => abilities(ctx).await,
        Command::Init => init(&ctx.config, &ctx.printer),
    }
}

fn init(config: &WardenConfig, printer: &Printer) -> Result<String, CliError> {
    let loader = ConfigLoader::default();
    loader.save(config)?;
    printer.message(format!("wrote {}", loader.config_path().display()))
}

async fn permission(cmd: PermissionCommand, ctx: &Context) -> Result<String, CliError> {
    match cmd {
        PermissionCommand::CreateResource { resource } => {
            let created = ctx.permissions.create_resource(&resource).await?;
            ctx.printer.permissions(&created)
        }
        PermissionCommand::Create { slug, name, model } => {
            let mut new = NewPermission::new(name.unwrap_or_else(|| slug.clone()), slug);
            if let Some(model) = model {
                new = new.with_model(model);
            }
            let created = ctx.permissions.create(new).await?;
            ctx.printer.permissions(slice::from_ref(&created))
        }
        PermissionCommand::List => {
            let permissions = ctx.store.permissions_with_roles().await?;
            ctx.printer.permissions(&permissions)
        }
        PermissionCommand::Delete { slug } => {
            let permission = ctx.require_permission(&slug).await?;
            ctx.permissions.delete(permission.id).await?;
            ctx.printer.message(format!("deleted permission {slug}"))
        }
        PermissionCommand::Roles { slug } => {
            let mut permission = ctx.require_permission(&slug).await?;
            ctx.assignments.load_roles(&mut permission).await?;
            ctx.printer.roles(permission.roles().unwrap_or_default())
        }
    }
}

async fn role(cmd: RoleCommand, ctx: &Context) -> Result<String, CliError> {
    match cmd {
        RoleCommand::Create {
            slug,
            name,
            description,
            system,
        } => {
            let mut new = NewRole::new(name.unwrap_or_else(|| slug.clone()), slug);
            if let Some(description) = description {
                new = new.with_description(description);
            }
            if system {
                new = new.system();
            }
            let role = ctx.roles.create(new).await?;
            ctx.printer.roles(slice::from_ref(&role))
        }
        RoleCommand::List => ctx.printer.roles(&ctx.roles.all().await?),
        RoleCommand::Delete { slug } => {
            let role = ctx.require_role(&slug).await?;
            ctx.roles.delete(&role).await?;
            ctx.printer.message(format!("deleted role {slug}"))
        }
        RoleCommand::Grant { role, permissions } => {
            let mut role = ctx.require_role(&role).await?;
            for slug in &permissions {
                if ctx.roles.grant_permission_by_slug(&mut role, slug).await? {
                    info!(role = %role.slug, permission = %slug, "permission granted");
                }
            }
            ctx.printer.roles(slice::from_ref(&role))
        }
        RoleCommand::Revoke { role, permissions } => {
            let mut role = ctx.require_role(&role).await?;
            for slug in &permissions {
                let permission = ctx.require_permission(slug).await?;
                ctx.roles.revoke_permission(&mut role, &permission).await?;
            }
            ctx.printer.roles(slice::from_ref(&role))
        }
        RoleCommand::Sync { role, permissions } => {
            let mut role = ctx.require_role(&role).await?;
            let mut ids = Vec::with_capacity(permissions.len());
            for slug in &permissions {
                ids.push(ctx.require_permission(slug).await?.id);
            }
            let changes = ctx.roles.sync_permissions(&mut role, &ids).await?;
            ctx.printer.sync(&changes)
        }
    }
}

async fn actor(cmd: ActorCommand, ctx: &Context) -> Result<String, CliError> {
    let record = |id: ActorId| Actor::unloaded(id, id.to_string());

    match cmd {
        ActorCommand::New => ctx.printer.message(ActorId::new().to_string()),
        ActorCommand::Assign { actor, roles } => {
            let mut actor = record(actor);
            for slug in &roles {
                ctx.assignments.attach_role_by_slug(&mut actor, slug).await?;
            }
            ctx.printer.roles(actor.roles().unwrap_or_default())
        }
        ActorCommand::Revoke { actor, roles } => {
            let mut actor = record(actor);
            for slug in &roles {
                ctx.assignments.revoke_role_by_slug(&mut actor, slug).await?;
            }
            ctx.printer.roles(actor.roles().unwrap_or_default())
        }
        ActorCommand::RevokeAll { actor } => {
            let removed = ctx.assignments.revoke_all_roles(&mut record(actor)).await?;
            ctx.printer.message(format!("revoked {removed} roles from {actor}"))
        }
        ActorCommand::Sync { actor, roles } => {
            let mut ids = Vec::with_capacity(roles.len());
            for slug in &roles {
                ids.push(ctx.require_role(slug).await?.id);
            }
            let changes = ctx.assignments.sync_roles(&mut record(actor), &ids).await?;
            ctx.printer.sync(&changes)
        }
        ActorCommand::Roles { actor } => {
            let mut actor = record(actor);
            ctx.assignments.load_roles(&mut actor).await?;
            ctx.printer.roles(actor.roles().unwrap_or_default())
        }
        ActorCommand::List { roles } => {
            let slugs: Vec<&str> = roles.iter().map(String::as_str).collect();
            let actors = ctx.assignments.actors_having_role_slugs(&slugs).await?;
            ctx.printer.actors(&actors)
        }
    }
}

async fn check(args: CheckArgs, ctx: &Context) -> Result<String, CliError> {
    let actor = match args.actor {
        Some(id) => {
            let mut actor = Actor::unloaded(id, id.to_string());
            ctx.assignments.load_roles(&mut actor).await?;
            Some(actor)
        }
        None => None,
    };
    let caller = match &actor {
        Some(actor) => Caller::Authenticated(actor),
        None => Caller::Guest,
    };

    let required: Vec<&str> = args.permissions.iter().map(String::as_str).collect();
    let granted = if args.at_least {
        ctx.resolver.can_at_least(caller, &required).await
    } else {
        ctx.resolver.can_access(caller, &required).await
    };

    let output = ctx.printer.decision(args.actor, &args.permissions, granted)?;
    if granted {
        Ok(output)
    } else {
        Err(CliError::Denied { output })
    }
}

async fn abilities(ctx: &Context) -> Result<String, CliError> {
    let gate = Arc::new(GateRegistry::new());
    ctx.registrar(gate.clone()).register().await;

    let abilities: Vec<(String, bool)> = gate
        .abilities()
        .into_iter()
        .map(|ability| {
            let delegated = gate.rule(&ability).map_or(false, |rule| rule.is_delegate());
            (ability, delegated)
        })
        .collect();
    ctx.printer.abilities(&abilities)
}
