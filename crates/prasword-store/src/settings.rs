//! Settings vault: the local registry of connection profiles.
//!
//! Always a SQLite file, whatever engine the profiles point at. Each
//! profile is serialized to JSON and encrypted as a whole under a key
//! derived from the vault password; name and engine type stay in clear
//! so the vault can be counted without a password.
//!
//! Writes replace the whole collection: load, mutate, re-encrypt every
//! record. The cycle runs inside one `BEGIN IMMEDIATE` transaction so
//! concurrent writers on the same file queue up instead of losing
//! updates.

use std::fmt;
use std::path::{Path, PathBuf};

use data_encoding::BASE64URL;
use prasword_crypto_core::{derive_key, generate_salt, CryptoError, FieldCipher, KdfParams};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;
use crate::error::StoreError;
use crate::session::now;

/// Domain-separation tag for profile records.
const PROFILE_AAD: &[u8] = b"prasword-profile-v1";

const SETTING_SALT: &str = "kdf_salt";
const SETTING_ITERATIONS: &str = "kdf_iterations";

/// A saved database connection.
///
/// Serializes to the record shape `{"name", "type", "path"}` or
/// `{"name", "type", "config": {…}}`, plus an optional remembered
/// `master_password`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    #[serde(flatten)]
    pub target: BackendConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_password: Option<String>,
}

impl ConnectionProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, target: BackendConfig) -> Self {
        Self {
            name: name.into(),
            target,
            master_password: None,
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("target", &self.target)
            .field(
                "master_password",
                &self.master_password.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// Handle to a settings vault file.
pub struct SettingsVault {
    conn: Connection,
    path: PathBuf,
    salt: Vec<u8>,
    params: KdfParams,
}

impl fmt::Debug for SettingsVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsVault")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SettingsVault {
    /// Open or create the vault at `path` with the default KDF cost.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Connection`] if the file cannot be opened
    /// - [`StoreError::Database`] if the tables cannot be created
    /// - [`StoreError::IncompatibleVault`] if the file holds profiles but no
    ///   salt; see [`reset`](Self::reset)
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, &KdfParams::default())
    }

    /// Open or create the vault at `path`. `params` only applies when the
    /// file gets its salt for the first time.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with(path: &Path, params: &KdfParams) -> Result<Self, StoreError> {
        let mut conn = open_file(path)?;
        let (salt, params) = resolve_kdf(&mut conn, path, params)?;
        tracing::debug!(path = %path.display(), "settings vault opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            salt,
            params,
        })
    }

    /// Wipe every profile and vault setting at `path`, then open it as a
    /// fresh vault with a new salt.
    ///
    /// The way out of [`StoreError::IncompatibleVault`]: the old records
    /// are lost and have to be added again.
    ///
    /// # Errors
    ///
    /// [`StoreError::Connection`] or [`StoreError::Database`] as for
    /// [`open`](Self::open).
    pub fn reset(path: &Path, params: &KdfParams) -> Result<Self, StoreError> {
        let mut conn = open_file(path)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let dropped = tx.execute("DELETE FROM databases", [])?;
        tx.execute("DELETE FROM app_settings", [])?;
        tx.commit()?;
        drop(conn);
        tracing::warn!(path = %path.display(), dropped, "settings vault reset");

        Self::open_with(path, params)
    }

    /// Path of the vault file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decrypt every stored profile.
    ///
    /// An empty vault yields an empty list for any password.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongVaultPassword`] if any record fails to
    /// decrypt or parse; no partial results are returned.
    pub fn load_profiles(&self, vault_password: &str) -> Result<Vec<ConnectionProfile>, StoreError> {
        let records = read_records(&self.conn)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        decrypt_records(&records, &self.cipher(vault_password)?)
    }

    /// One profile by name.
    ///
    /// # Errors
    ///
    /// - [`StoreError::WrongVaultPassword`] as for [`load_profiles`](Self::load_profiles)
    /// - [`StoreError::ProfileNotFound`] if no profile has this name
    pub fn get_profile(&self, name: &str, vault_password: &str) -> Result<ConnectionProfile, StoreError> {
        self.load_profiles(vault_password)?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StoreError::ProfileNotFound(name.to_string()))
    }

    /// Add a profile.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidInput`] if the name is empty
    /// - [`StoreError::DuplicateProfile`] if the name is taken; nothing is written
    /// - [`StoreError::WrongVaultPassword`] if existing records do not
    ///   decrypt; nothing is written
    pub fn add_profile(
        &mut self,
        profile: &ConnectionProfile,
        vault_password: &str,
    ) -> Result<(), StoreError> {
        if profile.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("profile name must not be empty".into()));
        }
        let cipher = self.cipher(vault_password)?;
        self.rewrite(&cipher, |profiles| {
            if profiles.iter().any(|p| p.name == profile.name) {
                return Err(StoreError::DuplicateProfile(profile.name.clone()));
            }
            profiles.push(profile.clone());
            Ok(())
        })?;
        tracing::info!(profile = %profile.name, kind = %profile.target.kind(), "connection profile added");
        Ok(())
    }

    /// Remove a profile by name.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ProfileNotFound`] if no profile has this name
    /// - [`StoreError::WrongVaultPassword`] if the records do not decrypt
    pub fn remove_profile(&mut self, name: &str, vault_password: &str) -> Result<(), StoreError> {
        let cipher = self.cipher(vault_password)?;
        self.rewrite(&cipher, |profiles| {
            let before = profiles.len();
            profiles.retain(|p| p.name != name);
            if profiles.len() == before {
                return Err(StoreError::ProfileNotFound(name.to_string()));
            }
            Ok(())
        })?;
        tracing::info!(profile = %name, "connection profile removed");
        Ok(())
    }

    /// Replace the whole collection with `profiles`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateProfile`] if two profiles share a
    /// name; nothing is written.
    pub fn save_profiles(
        &mut self,
        profiles: &[ConnectionProfile],
        vault_password: &str,
    ) -> Result<(), StoreError> {
        let cipher = self.cipher(vault_password)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_all(&tx, &cipher, profiles)?;
        tx.commit()?;
        Ok(())
    }

    /// Number of stored profiles. Needs no password.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the count query fails.
    pub fn profile_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM databases", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Whether any profile is stored. Needs no password.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the count query fails.
    pub fn has_profiles(&self) -> Result<bool, StoreError> {
        Ok(self.profile_count()? > 0)
    }

    fn cipher(&self, vault_password: &str) -> Result<FieldCipher, StoreError> {
        let key = derive_key(vault_password.as_bytes(), &self.salt, &self.params)?;
        Ok(FieldCipher::new(key, PROFILE_AAD))
    }

    /// Load, mutate and save all profiles inside one immediate transaction.
    fn rewrite<F>(&mut self, cipher: &FieldCipher, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<ConnectionProfile>) -> Result<(), StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut profiles = decrypt_records(&read_records(&tx)?, cipher)?;
        mutate(&mut profiles)?;
        write_all(&tx, cipher, &profiles)?;
        tx.commit()?;
        Ok(())
    }
}

/// Open the vault file, creating the tables and restricting permissions.
fn open_file(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)
        .map_err(|e| StoreError::Connection(format!("{}: {e}", path.display())))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS databases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            type TEXT NOT NULL,
            config_encrypted TEXT NOT NULL,
            created_at TEXT
        );
        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(conn)
}

/// Pick the salt and cost for a vault file, generating a per-file salt on
/// first use.
///
/// Records without a stored salt come from a version whose format cannot
/// be read here, so the file is refused rather than opened in a state
/// where every call fails.
fn resolve_kdf(
    conn: &mut Connection,
    path: &Path,
    params: &KdfParams,
) -> Result<(Vec<u8>, KdfParams), StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let stored_salt = read_setting(&tx, SETTING_SALT)?;
    let stored_iterations = read_setting(&tx, SETTING_ITERATIONS)?
        .and_then(|v| v.trim().parse::<u32>().ok());

    let resolved = if let Some(salt) = stored_salt {
        let salt = BASE64URL
            .decode(salt.as_bytes())
            .map_err(|e| CryptoError::Encoding(format!("stored vault salt: {e}")))?;
        let params = stored_iterations.map_or_else(KdfParams::default, |iterations| KdfParams {
            iterations,
        });
        (salt, params)
    } else {
        let records: i64 = tx.query_row("SELECT COUNT(*) FROM databases", [], |row| row.get(0))?;
        if records > 0 {
            return Err(StoreError::IncompatibleVault(path.display().to_string()));
        }
        let salt = generate_salt()?;
        write_setting(&tx, SETTING_SALT, &BASE64URL.encode(&salt))?;
        write_setting(&tx, SETTING_ITERATIONS, &params.iterations.to_string())?;
        (salt.to_vec(), params.clone())
    };

    tx.commit()?;
    Ok(resolved)
}

fn read_setting(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?)
}

fn write_setting(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO app_settings (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// `(name, config_encrypted)` pairs in insertion order.
fn read_records(conn: &Connection) -> Result<Vec<(String, String)>, StoreError> {
    let mut stmt = conn.prepare("SELECT name, config_encrypted FROM databases ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn decrypt_records(
    records: &[(String, String)],
    cipher: &FieldCipher,
) -> Result<Vec<ConnectionProfile>, StoreError> {
    records
        .iter()
        .map(|(name, encrypted)| {
            let json = zeroize::Zeroizing::new(cipher.decrypt(encrypted).map_err(|_| {
                tracing::debug!(profile = %name, "profile record did not decrypt");
                StoreError::WrongVaultPassword
            })?);
            serde_json::from_str(&json).map_err(|_| StoreError::WrongVaultPassword)
        })
        .collect()
}

fn write_all(
    conn: &Connection,
    cipher: &FieldCipher,
    profiles: &[ConnectionProfile],
) -> Result<(), StoreError> {
    conn.execute("DELETE FROM databases", [])?;
    let created_at = now();
    for profile in profiles {
        let json = zeroize::Zeroizing::new(serde_json::to_string(profile)?);
        let encrypted = cipher.encrypt(&json)?;
        conn.execute(
            "INSERT INTO databases (name, type, config_encrypted, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                profile.name,
                profile.target.kind().as_str(),
                encrypted,
                created_at
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ffi::ErrorCode::ConstraintViolation =>
            {
                StoreError::DuplicateProfile(profile.name.clone())
            }
            other => other.into(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PostgresConfig;

    const FAST: KdfParams = KdfParams { iterations: 10 };

    #[test]
    fn sqlite_profile_serializes_to_flat_record() {
        let profile = ConnectionProfile::new(
            "home",
            BackendConfig::Sqlite {
                path: PathBuf::from("/data/home.db"),
            },
        );
        let value: serde_json::Value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "home", "type": "sqlite", "path": "/data/home.db"})
        );
    }

    #[test]
    fn postgres_profile_reads_legacy_record_shape() {
        let json = r#"{
            "name": "office",
            "type": "postgresql",
            "config": {"host": "db.lan", "port": 5432, "database": "pw",
                       "user": "alice", "password": "pg-secret"},
            "master_password": "remembered"
        }"#;
        let profile: ConnectionProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.name, "office");
        assert_eq!(
            profile.target,
            BackendConfig::Postgresql {
                config: PostgresConfig {
                    host: "db.lan".into(),
                    port: 5432,
                    database: "pw".into(),
                    user: "alice".into(),
                    password: "pg-secret".into(),
                }
            }
        );
        assert_eq!(profile.master_password.as_deref(), Some("remembered"));

        let shown = format!("{profile:?}");
        assert!(!shown.contains("remembered"));
        assert!(!shown.contains("pg-secret"));
    }

    #[test]
    fn new_vault_gets_random_salt() {
        let dir = tempfile::tempdir().unwrap();
        let a = SettingsVault::open_with(&dir.path().join("a.db"), &FAST).unwrap();
        let b = SettingsVault::open_with(&dir.path().join("b.db"), &FAST).unwrap();
        assert_eq!(a.salt.len(), 16);
        assert_ne!(a.salt, b.salt);
        assert_eq!(a.params, FAST);
    }

    #[test]
    fn reopening_keeps_salt_and_cost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.db");
        let first = SettingsVault::open_with(&path, &FAST).unwrap();
        let salt = first.salt.clone();
        drop(first);

        let again = SettingsVault::open(&path).unwrap();
        assert_eq!(again.salt, salt);
        assert_eq!(again.params, FAST);
    }

    /// A vault as the Fernet-based desktop app left it: the same tables,
    /// a Fernet token per record and no `kdf_salt`.
    fn write_fernet_era_vault(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE databases (id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL, type TEXT NOT NULL,
                config_encrypted TEXT NOT NULL, created_at TEXT);
             CREATE TABLE app_settings (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO databases (name, type, config_encrypted, created_at) VALUES (
                'old', 'sqlite',
                'gAAAAABlmG1x0Qk3cP8Yt1Wc2mI5Xg7qQ2v9ZxF4nL8rT6aS3dK1hJ0uE5yB7wN2oM4pV9iC3gR6fH8jD1kA0sX5zQ7bU2eW4tY6nP9mL3cV8xF1hG5jK2==',
                '2024-01-05 10:22:41');",
        )
        .unwrap();
    }

    #[test]
    fn fernet_era_vault_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        write_fernet_era_vault(&path);

        let err = SettingsVault::open_with(&path, &FAST).unwrap_err();
        assert!(matches!(err, StoreError::IncompatibleVault(ref p) if p.ends_with("old.db")));

        // Refusing must not touch the file.
        let conn = Connection::open(&path).unwrap();
        let salts: i64 = conn
            .query_row("SELECT COUNT(*) FROM app_settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(salts, 0);
    }

    #[test]
    fn reset_clears_fernet_era_vault() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        write_fernet_era_vault(&path);

        let mut vault = SettingsVault::reset(&path, &FAST).unwrap();
        assert_eq!(vault.profile_count().unwrap(), 0);
        assert_eq!(vault.salt.len(), 16);

        let profile = ConnectionProfile::new(
            "new",
            BackendConfig::Sqlite {
                path: PathBuf::from("/new.db"),
            },
        );
        vault.add_profile(&profile, "vault").unwrap();
        drop(vault);

        let reopened = SettingsVault::open_with(&path, &FAST).unwrap();
        assert_eq!(reopened.load_profiles("vault").unwrap(), vec![profile]);
    }
}
