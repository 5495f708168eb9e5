//! `profile` subcommands: the settings vault.

use prasword_store::{BackendConfig, ConnectionProfile, PostgresConfig, SettingsVault};

use crate::cli::{AddPostgresArgs, ProfileCommand};
use crate::context::Context;
use crate::error::{CliError, Result};
use crate::output;

use super::require_non_empty;

pub fn run(ctx: &Context, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::AddSqlite {
            name,
            path,
            remember_master,
        } => add(ctx, name, BackendConfig::Sqlite { path }, remember_master),
        ProfileCommand::AddPostgres(args) => add_postgres(ctx, args),
        ProfileCommand::List => list(ctx),
        ProfileCommand::Remove { name } => {
            ctx.vault()?.remove_profile(&name, ctx.vault_password()?)?;
            output::status(ctx.format(), &format!("Removed profile {name}"))
        }
        ProfileCommand::Test { name } => test(ctx, &name),
        ProfileCommand::Reset { force } => reset(ctx, force),
    }
}

fn add_postgres(ctx: &Context, args: AddPostgresArgs) -> Result<()> {
    require_non_empty("database name", &args.database)?;
    require_non_empty("user", &args.user)?;
    let target = BackendConfig::Postgresql {
        config: PostgresConfig {
            host: args.host,
            port: args.port,
            database: args.database,
            user: args.user,
            password: args.pg_password,
        },
    };
    add(ctx, args.name, target, args.remember_master)
}

fn add(ctx: &Context, name: String, target: BackendConfig, remember_master: bool) -> Result<()> {
    require_non_empty("profile name", &name)?;
    let master_password = if remember_master {
        Some(ctx.global.master_password.clone().ok_or_else(|| {
            CliError::usage("--remember-master needs --master-password or PRASWORD_MASTER_PASSWORD")
        })?)
    } else {
        None
    };

    let profile = ConnectionProfile {
        name,
        target,
        master_password,
    };
    ctx.vault()?.add_profile(&profile, ctx.vault_password()?)?;
    output::status(ctx.format(), &format!("Saved profile {}", profile.name))
}

fn list(ctx: &Context) -> Result<()> {
    let vault = ctx.vault()?;
    if !vault.has_profiles()? {
        return output::emit(ctx.format(), &["NAME", "TYPE", "TARGET"], &[]);
    }
    let rows: Vec<Vec<String>> = vault
        .load_profiles(ctx.vault_password()?)?
        .into_iter()
        .map(|p| {
            vec![
                p.name,
                p.target.kind().to_string(),
                p.target.obscured(),
            ]
        })
        .collect();
    output::emit(ctx.format(), &["NAME", "TYPE", "TARGET"], &rows)
}

fn test(ctx: &Context, name: &str) -> Result<()> {
    let profile = ctx.vault()?.get_profile(name, ctx.vault_password()?)?;
    match &profile.target {
        #[cfg(feature = "postgres")]
        BackendConfig::Postgresql { config } => {
            prasword_store::PostgresBackend::test_connection(config)?;
        }
        target => {
            target.connect()?;
        }
    }
    tracing::info!(profile = %name, target = %profile.target.obscured(), "connection test passed");
    output::status(ctx.format(), &format!("Connection to {name} succeeded"))
}

fn reset(ctx: &Context, force: bool) -> Result<()> {
    if !force {
        return Err(CliError::usage(
            "reset deletes every saved profile; pass --force to confirm",
        ));
    }
    let vault = SettingsVault::reset(&ctx.settings_path(), &ctx.config.kdf_params())?;
    output::status(
        ctx.format(),
        &format!("Settings vault {} reset", vault.path().display()),
    )
}
