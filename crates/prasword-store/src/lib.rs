//! `prasword-store`: the encrypted credential store.
//!
//! Folders and password entries on SQLite or PostgreSQL, each text field
//! encrypted on its own under a key derived from the master password,
//! plus the settings vault that remembers connection profiles.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod backend;
pub mod error;
pub mod events;
pub mod schema;

pub mod session;

pub mod folders;
pub mod passwords;

pub mod config;
pub mod settings;

#[cfg(feature = "postgres")]
pub use backend::PostgresBackend;
pub use backend::{
    Backend, BackendConfig, BackendKind, PostgresConfig, Row, SqlValue, SqliteBackend,
};
pub use config::AppConfig;
pub use error::StoreError;
pub use events::{EncryptedField, EventSink, RecordingEvents, StoreEvent, TracingEvents};
pub use folders::{Folder, FolderCount, FolderUpdate};
pub use passwords::{NewPassword, PasswordEntry, PasswordUpdate};
pub use schema::{ensure_schema, SchemaStatus, DEFAULT_FOLDER_COLOR, DEFAULT_FOLDER_ID};
pub use session::Store;
pub use settings::{ConnectionProfile, SettingsVault};

pub use prasword_crypto_core::KdfParams;
