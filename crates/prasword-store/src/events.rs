//! Store observability.
//!
//! The library never installs a logger. A [`Store`](crate::Store) reports
//! what it does to an injected [`EventSink`]; [`TracingEvents`] forwards
//! those reports to `tracing`, and tests can record them instead.

#![warn(missing_docs)]

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::backend::BackendKind;

/// Which encrypted column of an entry failed to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedField {
    /// `title_encrypted`.
    Title,
    /// `username_encrypted`.
    Username,
    /// `password_encrypted`.
    Password,
    /// `url_encrypted`.
    Url,
    /// `notes_encrypted`.
    Notes,
}

impl fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Username => "username",
            Self::Password => "password",
            Self::Url => "url",
            Self::Notes => "notes",
        })
    }
}

/// Something a store did that a caller may want to observe.
///
/// Events never carry plaintext secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A session was opened.
    Connected {
        /// Engine of the database.
        backend: BackendKind,
        /// Target with secrets removed.
        target: String,
    },
    /// A new database was initialised with a fresh salt.
    Initialized {
        /// Engine of the database.
        backend: BackendKind,
        /// Target with secrets removed.
        target: String,
    },
    /// Tables were created or confirmed on an empty database.
    SchemaReady {
        /// Engine of the database.
        backend: BackendKind,
    },
    /// The session was closed and its key wiped.
    Closed {
        /// Engine of the database.
        backend: BackendKind,
    },
    /// A folder was created.
    FolderCreated {
        /// Id of the new folder.
        folder_id: i64,
    },
    /// A folder was renamed, recolored or given a new icon.
    FolderUpdated {
        /// Id of the changed folder.
        folder_id: i64,
    },
    /// A folder was removed after its entries moved to `moved_to`.
    FolderDeleted {
        /// Id of the removed folder.
        folder_id: i64,
        /// Folder that received its entries.
        moved_to: i64,
        /// Number of entries moved.
        moved_entries: u64,
    },
    /// An entry was stored.
    PasswordAdded {
        /// Id of the new entry.
        entry_id: i64,
    },
    /// An entry was rewritten.
    PasswordUpdated {
        /// Id of the changed entry.
        entry_id: i64,
    },
    /// An entry was removed.
    PasswordDeleted {
        /// Id of the removed entry.
        entry_id: i64,
    },
    /// A stored field could not be decrypted and was shown as empty.
    DecryptionFailed {
        /// Entry holding the field.
        entry_id: i64,
        /// Which column failed.
        field: EncryptedField,
    },
    /// Salt and every ciphertext were rotated under a new master password.
    MasterPasswordChanged {
        /// Number of entries re-encrypted.
        entries: usize,
    },
}

/// Receiver for [`StoreEvent`]s.
pub trait EventSink: Send + Sync {
    /// Handle one event. Must not block for long; it runs inline with the
    /// store operation that produced it.
    fn record(&self, event: &StoreEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn record(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Connected { backend, target } => {
                tracing::info!(%backend, %target, "credential store opened");
            }
            StoreEvent::Initialized { backend, target } => {
                tracing::info!(%backend, %target, "credential store initialised");
            }
            StoreEvent::SchemaReady { backend } => {
                tracing::debug!(%backend, "schema ready");
            }
            StoreEvent::Closed { backend } => {
                tracing::info!(%backend, "credential store closed");
            }
            StoreEvent::FolderCreated { folder_id } => {
                tracing::info!(folder_id, "folder created");
            }
            StoreEvent::FolderUpdated { folder_id } => {
                tracing::info!(folder_id, "folder updated");
            }
            StoreEvent::FolderDeleted {
                folder_id,
                moved_to,
                moved_entries,
            } => {
                tracing::info!(folder_id, moved_to, moved_entries, "folder deleted");
            }
            StoreEvent::PasswordAdded { entry_id } => {
                tracing::info!(entry_id, "password entry added");
            }
            StoreEvent::PasswordUpdated { entry_id } => {
                tracing::info!(entry_id, "password entry updated");
            }
            StoreEvent::PasswordDeleted { entry_id } => {
                tracing::info!(entry_id, "password entry deleted");
            }
            StoreEvent::DecryptionFailed { entry_id, field } => {
                tracing::warn!(entry_id, %field, "field could not be decrypted, shown as empty");
            }
            StoreEvent::MasterPasswordChanged { entries } => {
                tracing::info!(entries, "master password changed");
            }
        }
    }
}

/// Keeps every event in memory. Useful in tests and for callers that
/// want to show a summary after a batch of operations.
#[derive(Debug, Default, Clone)]
pub struct RecordingEvents {
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl RecordingEvents {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

impl EventSink for RecordingEvents {
    fn record(&self, event: &StoreEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
    }
}
