//! `prasword`: command-line front end for the encrypted credential store.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

mod cli;
mod commands;
mod context;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use prasword_store::AppConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::context::Context;

fn main() -> ExitCode {
    let Cli { global, command } = Cli::parse();
    let config = AppConfig::load(&global.data_dir);

    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(global, config);
    match commands::run(&ctx, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("hint: {hint}");
            }
            e.exit_code()
        }
    }
}
