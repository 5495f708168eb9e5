//! Resolves which database a command targets and opens it.

use std::path::PathBuf;
use std::sync::Arc;

use prasword_store::{
    AppConfig, BackendConfig, ConnectionProfile, SettingsVault, Store, TracingEvents,
};

use crate::cli::GlobalArgs;
use crate::error::{CliError, Result};
use crate::output::OutputFormat;

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub global: GlobalArgs,
    pub config: AppConfig,
}

impl Context {
    pub fn new(global: GlobalArgs, config: AppConfig) -> Self {
        Self { global, config }
    }

    pub const fn format(&self) -> OutputFormat {
        OutputFormat::from_flag(self.global.json)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config.settings_path(&self.global.data_dir)
    }

    pub fn vault(&self) -> Result<SettingsVault> {
        Ok(SettingsVault::open_with(
            &self.settings_path(),
            &self.config.kdf_params(),
        )?)
    }

    pub fn vault_password(&self) -> Result<&str> {
        self.global.vault_password.as_deref().ok_or_else(|| {
            CliError::usage(
                "vault password required: pass --vault-password or set PRASWORD_VAULT_PASSWORD",
            )
        })
    }

    /// Database selected by `--db` or `--profile`, with the master
    /// password remembered in the profile, if any.
    pub fn target(&self) -> Result<(BackendConfig, Option<String>)> {
        if let Some(path) = &self.global.db {
            return Ok((BackendConfig::Sqlite { path: path.clone() }, None));
        }
        let Some(name) = &self.global.profile else {
            return Err(CliError::usage(
                "no database selected: pass --db <PATH> or --profile <NAME>",
            ));
        };
        let ConnectionProfile {
            target,
            master_password,
            ..
        } = self.vault()?.get_profile(name, self.vault_password()?)?;
        Ok((target, master_password))
    }

    fn master_password(&self, remembered: Option<String>) -> Result<String> {
        self.global
            .master_password
            .clone()
            .or(remembered)
            .ok_or_else(|| {
                CliError::usage(
                    "master password required: pass --master-password or set PRASWORD_MASTER_PASSWORD",
                )
            })
    }

    /// Connect to the selected, already initialised database.
    pub fn open_store(&self) -> Result<Store> {
        let (target, remembered) = self.target()?;
        let password = self.master_password(remembered)?;
        let backend = target.connect()?;
        Ok(Store::connect(backend, &password, Arc::new(TracingEvents))?)
    }

    /// Initialise the selected database.
    pub fn create_store(&self) -> Result<Store> {
        let (target, remembered) = self.target()?;
        let password = self.master_password(remembered)?;
        if password.is_empty() {
            return Err(CliError::usage("master password must not be empty"));
        }
        let backend = target.create()?;
        Ok(Store::create(
            backend,
            &password,
            &self.config.kdf_params(),
            Arc::new(TracingEvents),
        )?)
    }
}
