//! Application configuration, stored as plain JSON next to the settings
//! vault.
//!
//! Holds nothing secret. Master and vault passwords come from the caller
//! (flags or environment), never from this file.

use std::fs;
use std::path::{Path, PathBuf};

use prasword_crypto_core::{KdfParams, DEFAULT_ITERATIONS};
use serde::{Deserialize, Serialize};

use crate::schema::DEFAULT_FOLDER_COLOR;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "prasword.json";

/// Default name of the settings vault file.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.db";

/// Application configuration.
///
/// Persisted to `{data_dir}/prasword.json`. Every field has a default, so
/// a partial file is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Settings vault path. Relative paths resolve against the data
    /// directory.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// PBKDF2 rounds for newly created databases and vaults.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Color given to folders created without one.
    #[serde(default = "default_folder_color")]
    pub default_folder_color: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            log_filter: default_log_filter(),
            kdf_iterations: default_kdf_iterations(),
            default_folder_color: default_folder_color(),
        }
    }
}

fn default_settings_file() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_FILE)
}
fn default_log_filter() -> String {
    "warn".into()
}
const fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}
fn default_folder_color() -> String {
    DEFAULT_FOLDER_COLOR.into()
}

impl AppConfig {
    /// Load from `{data_dir}/prasword.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or is not
    /// valid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write to `{data_dir}/prasword.json` via a temporary file and rename.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// write or rename fails.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let tmp = data_dir.join(".prasword.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)
    }

    /// Settings vault path, resolved against `data_dir`.
    #[must_use]
    pub fn settings_path(&self, data_dir: &Path) -> PathBuf {
        if self.settings_file.is_absolute() {
            self.settings_file.clone()
        } else {
            data_dir.join(&self.settings_file)
        }
    }

    /// KDF parameters for new databases and vaults.
    #[must_use]
    pub const fn kdf_params(&self) -> KdfParams {
        KdfParams {
            iterations: self.kdf_iterations,
        }
    }
}
