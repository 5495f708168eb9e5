//! Store error types for `prasword-store`.

use prasword_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by store, repository and settings-vault operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The backend could not be reached: missing file, network or
    /// authentication failure. The session stays unopened.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Table creation failed while preparing the schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// Any other backend error.
    #[error("database error: {0}")]
    Database(String),

    /// The master password does not open this database.
    #[error("invalid master password")]
    InvalidPassword,

    /// The vault password does not decrypt the stored connection profiles.
    #[error("invalid vault password")]
    WrongVaultPassword,

    /// The settings vault holds profiles this version cannot decrypt (a
    /// file from before per-file salts). [`SettingsVault::reset`] clears it.
    ///
    /// [`SettingsVault::reset`]: crate::SettingsVault::reset
    #[error("settings vault {0} was written by an incompatible version; reset it to continue")]
    IncompatibleVault(String),

    /// The database already carries a salt; creating it again would make
    /// every stored secret unreadable.
    #[error("database is already initialized")]
    AlreadyInitialized,

    /// The database has no salt, so no key can be derived for it.
    #[error("database is not initialized: {0}")]
    NotInitialized(String),

    /// The default folder cannot be deleted.
    #[error("folder {0} is protected and cannot be deleted")]
    ProtectedFolder(i64),

    /// Folder not found by ID.
    #[error("folder not found: {0}")]
    FolderNotFound(i64),

    /// Password entry not found by ID.
    #[error("password entry not found: {0}")]
    PasswordNotFound(i64),

    /// A connection profile with this name already exists.
    #[error("connection profile already exists: {0}")]
    DuplicateProfile(String),

    /// Connection profile not found by name.
    #[error("connection profile not found: {0}")]
    ProfileNotFound(String),

    /// Caller-supplied value rejected before reaching the backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // SQLITE_NOTADB (code 26): the file exists but is not a database.
        if let rusqlite::Error::SqliteFailure(ref ffi_err, _) = err {
            if ffi_err.code == rusqlite::ffi::ErrorCode::NotADatabase {
                return Self::Connection(format!("not a database file: {err}"));
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                Self::Connection(err.to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}
