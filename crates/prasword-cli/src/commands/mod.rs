//! Command implementations.

mod database;
mod entry;
mod folder;
mod generate;
mod profile;

use crate::cli::Command;
use crate::context::Context;
use crate::error::{CliError, Result};

pub fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Profile(cmd) => profile::run(ctx, cmd),
        Command::Init => database::init(ctx),
        Command::Folder(cmd) => folder::run(ctx, cmd),
        Command::Entry(cmd) => entry::run(ctx, cmd),
        Command::ChangePassword(args) => database::change_password(ctx, &args),
        Command::Generate(args) => generate::run(ctx, &args),
    }
}

/// Reject blank values the store would otherwise accept.
fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(CliError::usage(format!("{what} must not be empty")))
    } else {
        Ok(())
    }
}
