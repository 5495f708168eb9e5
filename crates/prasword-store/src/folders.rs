//! Folder management.
//!
//! Folders group password entries. Folder [`DEFAULT_FOLDER_ID`] always
//! exists: it cannot be deleted and receives the entries of deleted
//! folders unless another target is given.

#![warn(missing_docs)]

use data_encoding::BASE64;

use crate::backend::{Row, SqlValue};
use crate::error::StoreError;
use crate::events::StoreEvent;
use crate::schema::{DEFAULT_FOLDER_COLOR, DEFAULT_FOLDER_ID};
use crate::session::{now, Store};

/// A folder row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Row id; 1 is the default folder.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Raw image bytes, if the folder has an icon.
    pub icon: Option<Vec<u8>>,
    /// Hex color such as `#3498db`.
    pub color: String,
    /// RFC 3339 creation time.
    pub created_at: Option<String>,
    /// RFC 3339 time of the last change.
    pub updated_at: Option<String>,
}

impl Folder {
    /// Icon bytes as standard base64, for rendering layers that take text.
    #[must_use]
    pub fn icon_base64(&self) -> Option<String> {
        self.icon.as_deref().map(|bytes| BASE64.encode(bytes))
    }

    fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.int(0)?,
            name: row.text(1)?,
            icon: row.opt_blob(2)?,
            color: row
                .opt_text(3)?
                .unwrap_or_else(|| DEFAULT_FOLDER_COLOR.to_string()),
            created_at: row.opt_text(4)?,
            updated_at: row.opt_text(5)?,
        })
    }
}

/// Fields to change on a folder. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderUpdate {
    /// New display name; must not be blank.
    pub name: Option<String>,
    /// New icon bytes.
    pub icon: Option<Vec<u8>>,
    /// New hex color.
    pub color: Option<String>,
}

/// Number of entries filed under one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCount {
    /// Folder row id.
    pub id: i64,
    /// Folder display name.
    pub name: String,
    /// Folder hex color.
    pub color: String,
    /// Entries filed under the folder; zero for empty folders.
    pub password_count: i64,
}

const FOLDER_COLUMNS: &str = "id, name, icon, color, created_at, updated_at";

impl Store {
    /// Create a folder and return its id. `color` defaults to
    /// [`DEFAULT_FOLDER_COLOR`].
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidInput`] if `name` is empty
    /// - [`StoreError::Database`] if the insert fails
    pub fn create_folder(
        &mut self,
        name: &str,
        icon: Option<&[u8]>,
        color: Option<&str>,
    ) -> Result<i64, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("folder name must not be empty".into()));
        }
        let ts = now();
        let id = self.backend_mut().insert_returning_id(
            "INSERT INTO folders (name, icon, color, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
            &[
                name.into(),
                icon.into(),
                color.unwrap_or(DEFAULT_FOLDER_COLOR).into(),
                ts.clone().into(),
                ts.into(),
            ],
        )?;
        self.emit(&StoreEvent::FolderCreated { folder_id: id });
        Ok(id)
    }

    /// All folders, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub fn list_folders(&mut self) -> Result<Vec<Folder>, StoreError> {
        let rows = self.backend_mut().query(
            &format!("SELECT {FOLDER_COLUMNS} FROM folders ORDER BY name, id"),
            &[],
        )?;
        rows.iter().map(Folder::from_row).collect()
    }

    /// One folder by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FolderNotFound`] if no folder has this id.
    pub fn get_folder(&mut self, id: i64) -> Result<Folder, StoreError> {
        let rows = self.backend_mut().query(
            &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"),
            &[id.into()],
        )?;
        rows.first()
            .ok_or(StoreError::FolderNotFound(id))
            .and_then(Folder::from_row)
    }

    /// Rewrite the supplied fields of a folder. `updated_at` is always
    /// bumped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidInput`] if a new name is empty
    /// - [`StoreError::FolderNotFound`] if no folder has this id
    pub fn update_folder(&mut self, id: i64, update: &FolderUpdate) -> Result<(), StoreError> {
        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(StoreError::InvalidInput("folder name must not be empty".into()));
            }
            sets.push("name = ?");
            params.push(name.as_str().into());
        }
        if let Some(icon) = &update.icon {
            sets.push("icon = ?");
            params.push(icon.clone().into());
        }
        if let Some(color) = &update.color {
            sets.push("color = ?");
            params.push(color.as_str().into());
        }
        sets.push("updated_at = ?");
        params.push(now().into());
        params.push(id.into());

        let sql = format!("UPDATE folders SET {} WHERE id = ?", sets.join(", "));
        if self.backend_mut().execute(&sql, &params)? == 0 {
            return Err(StoreError::FolderNotFound(id));
        }
        self.emit(&StoreEvent::FolderUpdated { folder_id: id });
        Ok(())
    }

    /// Delete a folder after moving its entries to `move_to`.
    ///
    /// Both steps run in one transaction. Returns the number of entries
    /// moved.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ProtectedFolder`] for the default folder; nothing changes
    /// - [`StoreError::InvalidInput`] if `move_to == id`
    /// - [`StoreError::FolderNotFound`] if either folder is missing; the
    ///   transaction is rolled back
    pub fn delete_folder(&mut self, id: i64, move_to: i64) -> Result<u64, StoreError> {
        if id == DEFAULT_FOLDER_ID {
            return Err(StoreError::ProtectedFolder(id));
        }
        if move_to == id {
            return Err(StoreError::InvalidInput(format!(
                "cannot move entries of folder {id} into itself"
            )));
        }

        let moved = self.in_transaction(|tx, _| {
            let target = tx.query("SELECT id FROM folders WHERE id = ?", &[move_to.into()])?;
            if target.is_empty() {
                return Err(StoreError::FolderNotFound(move_to));
            }
            let moved = tx.execute(
                "UPDATE passwords SET folder_id = ? WHERE folder_id = ?",
                &[move_to.into(), id.into()],
            )?;
            if tx.execute("DELETE FROM folders WHERE id = ?", &[id.into()])? == 0 {
                return Err(StoreError::FolderNotFound(id));
            }
            Ok(moved)
        })?;

        self.emit(&StoreEvent::FolderDeleted {
            folder_id: id,
            moved_to: move_to,
            moved_entries: moved,
        });
        Ok(moved)
    }

    /// Entry count per folder, including empty folders, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub fn count_by_folder(&mut self) -> Result<Vec<FolderCount>, StoreError> {
        let rows = self.backend_mut().query(
            "SELECT f.id, f.name, f.color, COUNT(p.id) \
             FROM folders f \
             LEFT JOIN passwords p ON f.id = p.folder_id \
             GROUP BY f.id, f.name, f.color \
             ORDER BY f.name, f.id",
            &[],
        )?;
        rows.iter()
            .map(|row| {
                Ok(FolderCount {
                    id: row.int(0)?,
                    name: row.text(1)?,
                    color: row
                        .opt_text(2)?
                        .unwrap_or_else(|| DEFAULT_FOLDER_COLOR.to_string()),
                    password_count: row.int(3)?,
                })
            })
            .collect()
    }
}
