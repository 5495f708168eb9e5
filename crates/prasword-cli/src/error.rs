//! CLI error type and exit codes.

use std::process::ExitCode;

use prasword_crypto_core::CryptoError;
use prasword_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("{0}")]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Follow-up the user can act on, printed under the error line.
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Store(StoreError::IncompatibleVault(_)) => {
                Some("run `prasword profile reset --force` to start an empty settings vault")
            }
            _ => None,
        }
    }

    /// 2 for bad invocations, 3 for rejected passwords, 4 for missing
    /// records, 1 otherwise.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) | Self::Store(StoreError::InvalidInput(_)) => ExitCode::from(2),
            Self::Store(StoreError::InvalidPassword | StoreError::WrongVaultPassword) => {
                ExitCode::from(3)
            }
            Self::Store(
                StoreError::FolderNotFound(_)
                | StoreError::PasswordNotFound(_)
                | StoreError::ProfileNotFound(_),
            ) => ExitCode::from(4),
            _ => ExitCode::FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
