//! Open credential-store session: key derivation, verification and the
//! master-password change.
//!
//! A [`Store`] owns one backend connection and one [`FieldCipher`] bound
//! to the derived key. Folder and entry operations live in
//! [`folders`](crate::folders) and [`passwords`](crate::passwords) as
//! further `impl Store` blocks.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use data_encoding::BASE64URL;
use prasword_crypto_core::{derive_key, generate_salt, CryptoError, FieldCipher, KdfParams};
use zeroize::Zeroizing;

use crate::backend::{self, Backend, BackendKind, SqlValue};
use crate::error::StoreError;
use crate::events::{EventSink, StoreEvent};
use crate::schema::{ensure_schema, SchemaStatus};

/// Domain-separation tag for entry fields.
pub(crate) const FIELD_AAD: &[u8] = b"prasword-field-v1";

/// Plaintext sealed under `_metadata.verifier`.
const VERIFIER_PLAINTEXT: &str = "prasword key check";

const META_SALT: &str = "salt";
const META_ITERATIONS: &str = "kdf_iterations";
const META_VERIFIER: &str = "verifier";

/// Current UTC time as stored in timestamp columns.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A key-bound session on one credential database.
pub struct Store {
    backend: Box<dyn Backend>,
    cipher: FieldCipher,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.describe())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Initialise a new database and open a session on it.
    ///
    /// Creates the tables, generates a fresh salt and stores it together
    /// with the iteration count and a key verifier.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyInitialized`] if the database already has a salt
    /// - [`StoreError::Schema`] if table creation fails
    /// - [`StoreError::Crypto`] if key derivation fails
    pub fn create(
        mut backend: Box<dyn Backend>,
        master_password: &str,
        params: &KdfParams,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, StoreError> {
        if ensure_schema(backend.as_mut())? == SchemaStatus::Ready {
            events.record(&StoreEvent::SchemaReady {
                backend: backend.kind(),
            });
        }
        if read_meta(backend.as_mut(), META_SALT)?.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }

        let salt = generate_salt()?;
        let cipher = FieldCipher::new(
            derive_key(master_password.as_bytes(), &salt, params)?,
            FIELD_AAD,
        );
        let verifier = cipher.encrypt(VERIFIER_PLAINTEXT)?;

        backend::in_transaction(backend.as_mut(), |tx| {
            write_meta(tx, META_SALT, &BASE64URL.encode(&salt))?;
            write_meta(tx, META_ITERATIONS, &params.iterations.to_string())?;
            write_meta(tx, META_VERIFIER, &verifier)
        })?;

        events.record(&StoreEvent::Initialized {
            backend: backend.kind(),
            target: backend.describe(),
        });

        Ok(Self {
            backend,
            cipher,
            events,
        })
    }

    /// Open a session on an existing database.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotInitialized`] if the database has no salt
    /// - [`StoreError::InvalidPassword`] if the password does not open it
    pub fn connect(
        mut backend: Box<dyn Backend>,
        master_password: &str,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, StoreError> {
        if ensure_schema(backend.as_mut())? == SchemaStatus::Ready {
            events.record(&StoreEvent::SchemaReady {
                backend: backend.kind(),
            });
        }

        let salt_text = read_meta(backend.as_mut(), META_SALT)?
            .ok_or_else(|| StoreError::NotInitialized(backend.describe()))?;
        let salt = BASE64URL
            .decode(salt_text.as_bytes())
            .map_err(|e| CryptoError::Encoding(format!("stored salt: {e}")))?;
        let params = read_kdf_params(backend.as_mut())?;

        let cipher = FieldCipher::new(
            derive_key(master_password.as_bytes(), &salt, &params)?,
            FIELD_AAD,
        );
        verify_key(backend.as_mut(), &cipher)?;

        events.record(&StoreEvent::Connected {
            backend: backend.kind(),
            target: backend.describe(),
        });

        Ok(Self {
            backend,
            cipher,
            events,
        })
    }

    /// Close the session. The key is wiped when the cipher drops.
    pub fn close(self) {
        self.events.record(&StoreEvent::Closed {
            backend: self.backend.kind(),
        });
    }

    /// Engine behind this session.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Re-key the database under a new master password.
    ///
    /// Every stored field is decrypted with the current key and
    /// re-encrypted under a key derived from `new_password` and a fresh
    /// salt. Rows, salt and verifier are rewritten in one transaction; on
    /// any failure nothing changes and the session keeps its current key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Crypto`] if any stored field fails to decrypt
    /// under the current key, or a backend error from the rewrite.
    pub fn change_master_password(&mut self, new_password: &str) -> Result<(), StoreError> {
        let params = read_kdf_params(self.backend.as_mut())?;
        let rows = self.backend.query(
            "SELECT id, title_encrypted, username_encrypted, password_encrypted, \
             url_encrypted, notes_encrypted FROM passwords ORDER BY id",
            &[],
        )?;

        let salt = generate_salt()?;
        let next = FieldCipher::new(
            derive_key(new_password.as_bytes(), &salt, &params)?,
            FIELD_AAD,
        );

        let mut rewritten = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = row.int(0)?;
            let mut fields = Vec::with_capacity(5);
            for col in 1..=5 {
                let stored = row.opt_text(col)?.unwrap_or_default();
                let plain = Zeroizing::new(self.cipher.decrypt(&stored)?);
                fields.push(SqlValue::from(next.encrypt(&plain)?));
            }
            fields.push(id.into());
            rewritten.push(fields);
        }
        let verifier = next.encrypt(VERIFIER_PLAINTEXT)?;

        backend::in_transaction(self.backend.as_mut(), |tx| {
            for params in &rewritten {
                tx.execute(
                    "UPDATE passwords SET title_encrypted = ?, username_encrypted = ?, \
                     password_encrypted = ?, url_encrypted = ?, notes_encrypted = ? \
                     WHERE id = ?",
                    params,
                )?;
            }
            write_meta(tx, META_SALT, &BASE64URL.encode(&salt))?;
            write_meta(tx, META_VERIFIER, &verifier)
        })?;

        self.cipher = next;
        self.emit(&StoreEvent::MasterPasswordChanged {
            entries: rewritten.len(),
        });
        Ok(())
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    pub(crate) const fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    pub(crate) fn emit(&self, event: &StoreEvent) {
        self.events.record(event);
    }

    /// Run `f` in a transaction with access to the cipher.
    pub(crate) fn in_transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn Backend, &FieldCipher) -> Result<T, StoreError>,
    {
        let cipher = &self.cipher;
        backend::in_transaction(self.backend.as_mut(), |tx| f(tx, cipher))
    }
}

fn read_meta(backend: &mut dyn Backend, key: &str) -> Result<Option<String>, StoreError> {
    let rows = backend.query("SELECT value FROM _metadata WHERE key = ?", &[key.into()])?;
    rows.first().map_or(Ok(None), |row| row.opt_text(0))
}

fn write_meta(backend: &mut dyn Backend, key: &str, value: &str) -> Result<(), StoreError> {
    // Portable upsert: both engines accept delete-then-insert.
    backend.execute("DELETE FROM _metadata WHERE key = ?", &[key.into()])?;
    backend.execute(
        "INSERT INTO _metadata (key, value) VALUES (?, ?)",
        &[key.into(), value.into()],
    )?;
    Ok(())
}

fn read_kdf_params(backend: &mut dyn Backend) -> Result<KdfParams, StoreError> {
    match read_meta(backend, META_ITERATIONS)? {
        Some(text) => {
            let iterations = text.trim().parse::<u32>().map_err(|e| {
                StoreError::Database(format!("invalid {META_ITERATIONS} value {text:?}: {e}"))
            })?;
            Ok(KdfParams { iterations })
        }
        None => Ok(KdfParams::default()),
    }
}

/// Reject a key that does not open this database.
///
/// Prefers the stored verifier. Databases without one are checked
/// against the oldest entry title; an empty database accepts any key.
fn verify_key(backend: &mut dyn Backend, cipher: &FieldCipher) -> Result<(), StoreError> {
    if let Some(verifier) = read_meta(backend, META_VERIFIER)? {
        return match cipher.decrypt(&verifier) {
            Ok(plain) if plain == VERIFIER_PLAINTEXT => Ok(()),
            _ => Err(StoreError::InvalidPassword),
        };
    }

    let rows = backend.query(
        "SELECT title_encrypted FROM passwords ORDER BY id LIMIT 1",
        &[],
    )?;
    match rows.first() {
        Some(row) => {
            let title = row.opt_text(0)?.unwrap_or_default();
            cipher
                .decrypt(&title)
                .map(drop)
                .map_err(|_| StoreError::InvalidPassword)
        }
        None => Ok(()),
    }
}
