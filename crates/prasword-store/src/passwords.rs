//! Password entries.
//!
//! Title, username, password, url and notes are each encrypted on their
//! own before they reach the backend. Reads are lenient per field: a field
//! that fails to decrypt comes back empty and a
//! [`StoreEvent::DecryptionFailed`] is recorded, so one damaged value
//! never hides the rest of a listing.

#![warn(missing_docs)]

use std::cmp::Ordering;
use std::fmt;

use crate::backend::{Row, SqlValue};
use crate::error::StoreError;
use crate::events::{EncryptedField, StoreEvent};
use crate::schema::DEFAULT_FOLDER_ID;
use crate::session::{now, Store};

/// A decrypted password entry joined with its folder name.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordEntry {
    /// Row id.
    pub id: i64,
    /// Folder the entry is filed under.
    pub folder_id: i64,
    /// Name of that folder; empty if the folder row is gone.
    pub folder_name: String,
    /// Decrypted title (e.g., "Bank").
    pub title: String,
    /// Decrypted login name.
    pub username: String,
    /// Decrypted secret.
    pub password: String,
    /// Decrypted website address.
    pub url: String,
    /// Decrypted free-form notes.
    pub notes: String,
    /// RFC 3339 creation time.
    pub created_at: Option<String>,
    /// RFC 3339 time of the last change.
    pub updated_at: Option<String>,
}

impl fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("id", &self.id)
            .field("folder_id", &self.folder_id)
            .field("folder_name", &self.folder_name)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"***")
            .field("url", &self.url)
            .field("notes", &"***")
            .finish_non_exhaustive()
    }
}

/// Input for [`Store::add_password`].
#[derive(Clone, PartialEq, Eq)]
pub struct NewPassword {
    /// Display title.
    pub title: String,
    /// Login name; may be empty.
    pub username: String,
    /// Secret to store.
    pub password: String,
    /// Target folder; must exist.
    pub folder_id: i64,
    /// Website address; may be empty.
    pub url: String,
    /// Free-form notes; may be empty.
    pub notes: String,
}

impl NewPassword {
    /// Entry in the default folder with no username, url or notes.
    #[must_use]
    pub fn new(title: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            username: String::new(),
            password: password.into(),
            folder_id: DEFAULT_FOLDER_ID,
            url: String::new(),
            notes: String::new(),
        }
    }
}

impl fmt::Debug for NewPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPassword")
            .field("title", &self.title)
            .field("folder_id", &self.folder_id)
            .finish_non_exhaustive()
    }
}

/// Fields to change on an entry. `None` leaves a field as it is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PasswordUpdate {
    /// New title.
    pub title: Option<String>,
    /// New login name.
    pub username: Option<String>,
    /// New secret.
    pub password: Option<String>,
    /// New website address.
    pub url: Option<String>,
    /// New notes.
    pub notes: Option<String>,
    /// Folder to move the entry to.
    pub folder_id: Option<i64>,
}

impl fmt::Debug for PasswordUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordUpdate")
            .field("title", &self.title)
            .field("folder_id", &self.folder_id)
            .finish_non_exhaustive()
    }
}

const ENTRY_SELECT: &str = "SELECT p.id, p.folder_id, f.name, p.title_encrypted, \
     p.username_encrypted, p.password_encrypted, p.url_encrypted, p.notes_encrypted, \
     p.created_at, p.updated_at \
     FROM passwords p LEFT JOIN folders f ON p.folder_id = f.id";

impl Store {
    /// Encrypt and insert an entry; returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Crypto`] if encryption fails, or
    /// [`StoreError::Database`] if the insert fails (for example an
    /// unknown folder).
    pub fn add_password(&mut self, entry: &NewPassword) -> Result<i64, StoreError> {
        let cipher = self.cipher();
        let ts = now();
        let params: [SqlValue; 8] = [
            entry.folder_id.into(),
            cipher.encrypt(&entry.title)?.into(),
            cipher.encrypt(&entry.username)?.into(),
            cipher.encrypt(&entry.password)?.into(),
            cipher.encrypt(&entry.url)?.into(),
            cipher.encrypt(&entry.notes)?.into(),
            ts.clone().into(),
            ts.into(),
        ];

        let id = self.backend_mut().insert_returning_id(
            "INSERT INTO passwords (folder_id, title_encrypted, username_encrypted, \
             password_encrypted, url_encrypted, notes_encrypted, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            &params,
        )?;
        self.emit(&StoreEvent::PasswordAdded { entry_id: id });
        Ok(id)
    }

    /// Decrypted entries, optionally limited to one folder.
    ///
    /// Unfiltered listings are ordered by folder name then title; a
    /// folder listing is ordered by title. Titles are stored encrypted, so
    /// ordering happens after decryption.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails. Per-field
    /// decryption failures do not fail the call.
    pub fn get_passwords(&mut self, folder_id: Option<i64>) -> Result<Vec<PasswordEntry>, StoreError> {
        let rows = match folder_id {
            Some(folder) => self.backend_mut().query(
                &format!("{ENTRY_SELECT} WHERE p.folder_id = ?"),
                &[folder.into()],
            )?,
            None => self.backend_mut().query(ENTRY_SELECT, &[])?,
        };

        let mut entries = rows
            .iter()
            .map(|row| self.decrypt_entry(row))
            .collect::<Result<Vec<_>, _>>()?;

        if folder_id.is_some() {
            entries.sort_by(by_title);
        } else {
            entries.sort_by(|a, b| a.folder_name.cmp(&b.folder_name).then_with(|| by_title(a, b)));
        }
        Ok(entries)
    }

    /// One decrypted entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PasswordNotFound`] if no entry has this id.
    pub fn get_password(&mut self, id: i64) -> Result<PasswordEntry, StoreError> {
        let rows = self
            .backend_mut()
            .query(&format!("{ENTRY_SELECT} WHERE p.id = ?"), &[id.into()])?;
        let row = rows.first().ok_or(StoreError::PasswordNotFound(id))?;
        self.decrypt_entry(row)
    }

    /// Re-encrypt and rewrite the supplied fields of an entry.
    /// `updated_at` is always bumped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PasswordNotFound`] if no entry has this id.
    pub fn update_password(&mut self, id: i64, update: &PasswordUpdate) -> Result<(), StoreError> {
        let cipher = self.cipher();
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        let fields = [
            ("title_encrypted = ?", &update.title),
            ("username_encrypted = ?", &update.username),
            ("password_encrypted = ?", &update.password),
            ("url_encrypted = ?", &update.url),
            ("notes_encrypted = ?", &update.notes),
        ];
        for (set, value) in fields {
            if let Some(value) = value {
                sets.push(set);
                params.push(cipher.encrypt(value)?.into());
            }
        }
        if let Some(folder_id) = update.folder_id {
            sets.push("folder_id = ?");
            params.push(folder_id.into());
        }
        sets.push("updated_at = ?");
        params.push(now().into());
        params.push(id.into());

        let sql = format!("UPDATE passwords SET {} WHERE id = ?", sets.join(", "));
        if self.backend_mut().execute(&sql, &params)? == 0 {
            return Err(StoreError::PasswordNotFound(id));
        }
        self.emit(&StoreEvent::PasswordUpdated { entry_id: id });
        Ok(())
    }

    /// Delete an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PasswordNotFound`] if no entry has this id.
    pub fn delete_password(&mut self, id: i64) -> Result<(), StoreError> {
        if self
            .backend_mut()
            .execute("DELETE FROM passwords WHERE id = ?", &[id.into()])?
            == 0
        {
            return Err(StoreError::PasswordNotFound(id));
        }
        self.emit(&StoreEvent::PasswordDeleted { entry_id: id });
        Ok(())
    }

    /// Entries whose title, username, url or folder name contains `term`,
    /// ignoring case.
    ///
    /// Filters the full decrypted listing in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the listing query fails.
    pub fn search_passwords(&mut self, term: &str) -> Result<Vec<PasswordEntry>, StoreError> {
        let needle = term.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&needle);

        Ok(self
            .get_passwords(None)?
            .into_iter()
            .filter(|e| {
                matches(&e.title) || matches(&e.username) || matches(&e.url) || matches(&e.folder_name)
            })
            .collect())
    }

    fn decrypt_entry(&self, row: &Row) -> Result<PasswordEntry, StoreError> {
        let id = row.int(0)?;
        let field = |idx: usize, which: EncryptedField| -> Result<String, StoreError> {
            let stored = row.opt_text(idx)?.unwrap_or_default();
            Ok(self.cipher().decrypt(&stored).unwrap_or_else(|_| {
                self.emit(&StoreEvent::DecryptionFailed {
                    entry_id: id,
                    field: which,
                });
                String::new()
            }))
        };

        Ok(PasswordEntry {
            id,
            folder_id: row.int(1)?,
            folder_name: row.opt_text(2)?.unwrap_or_default(),
            title: field(3, EncryptedField::Title)?,
            username: field(4, EncryptedField::Username)?,
            password: field(5, EncryptedField::Password)?,
            url: field(6, EncryptedField::Url)?,
            notes: field(7, EncryptedField::Notes)?,
            created_at: row.opt_text(8)?,
            updated_at: row.opt_text(9)?,
        })
    }
}

fn by_title(a: &PasswordEntry, b: &PasswordEntry) -> Ordering {
    a.title.cmp(&b.title).then(a.id.cmp(&b.id))
}
