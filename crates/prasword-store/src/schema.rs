//! Table creation and the default folder.
//!
//! There is no version table: every statement is `IF NOT EXISTS`, so
//! running [`ensure_schema`] against any database is safe. A database
//! that already holds entries is left untouched.

use crate::backend::{in_transaction, Backend};
use crate::error::StoreError;
use crate::session::now;

/// Id of the folder that always exists and cannot be deleted.
pub const DEFAULT_FOLDER_ID: i64 = 1;

/// Name given to the default folder.
pub const DEFAULT_FOLDER_NAME: &str = "General";

/// Color used when a folder is created without one.
pub const DEFAULT_FOLDER_COLOR: &str = "#3498db";

/// Outcome of [`ensure_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Entries were already present; no DDL was run.
    Existing,
    /// Tables and the default folder are in place.
    Ready,
}

/// Create the credential tables and the default folder if needed.
///
/// # Errors
///
/// Returns [`StoreError::Schema`] if a table cannot be created; the
/// transaction is rolled back.
pub fn ensure_schema(backend: &mut dyn Backend) -> Result<SchemaStatus, StoreError> {
    if backend.table_exists("passwords")? {
        let rows = backend.query("SELECT COUNT(*) FROM passwords", &[])?;
        let count = rows.first().map_or(Ok(0), |row| row.int(0))?;
        if count > 0 {
            return Ok(SchemaStatus::Existing);
        }
    }

    in_transaction(backend, |tx| {
        create_tables(tx).map_err(|e| match e {
            StoreError::Database(msg) => StoreError::Schema(msg),
            other => other,
        })?;
        insert_default_folder(tx)?;
        tx.sync_id_sequence("folders")?;
        Ok(())
    })?;

    Ok(SchemaStatus::Ready)
}

fn create_tables(tx: &mut dyn Backend) -> Result<(), StoreError> {
    let types = tx.ddl_types();

    tx.execute(
        "CREATE TABLE IF NOT EXISTS _metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        &[],
    )?;

    tx.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS folders (
                id {id},
                name TEXT NOT NULL,
                icon {blob},
                color TEXT DEFAULT '{DEFAULT_FOLDER_COLOR}',
                created_at TEXT,
                updated_at TEXT
            )",
            id = types.id_column,
            blob = types.blob,
        ),
        &[],
    )?;

    tx.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS passwords (
                id {id},
                folder_id INTEGER DEFAULT {DEFAULT_FOLDER_ID}
                    REFERENCES folders(id) ON DELETE SET DEFAULT,
                title_encrypted TEXT NOT NULL,
                username_encrypted TEXT,
                password_encrypted TEXT NOT NULL,
                url_encrypted TEXT,
                notes_encrypted TEXT,
                created_at TEXT,
                updated_at TEXT
            )",
            id = types.id_column,
        ),
        &[],
    )?;

    Ok(())
}

fn insert_default_folder(tx: &mut dyn Backend) -> Result<(), StoreError> {
    let ts = now();
    tx.execute(
        "INSERT INTO folders (id, name, color, created_at, updated_at) \
         SELECT ?, ?, ?, ?, ? \
         WHERE NOT EXISTS (SELECT 1 FROM folders WHERE id = ?)",
        &[
            DEFAULT_FOLDER_ID.into(),
            DEFAULT_FOLDER_NAME.into(),
            DEFAULT_FOLDER_COLOR.into(),
            ts.clone().into(),
            ts.into(),
            DEFAULT_FOLDER_ID.into(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqliteBackend;

    #[test]
    fn fresh_database_gets_tables_and_general_folder() {
        let mut db = SqliteBackend::in_memory().unwrap();
        assert_eq!(ensure_schema(&mut db).unwrap(), SchemaStatus::Ready);

        for table in ["_metadata", "folders", "passwords"] {
            assert!(db.table_exists(table).unwrap(), "{table} missing");
        }
        let rows = db
            .query("SELECT id, name, color FROM folders", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int(0).unwrap(), DEFAULT_FOLDER_ID);
        assert_eq!(rows[0].text(1).unwrap(), "General");
        assert_eq!(rows[0].text(2).unwrap(), DEFAULT_FOLDER_COLOR);
    }

    #[test]
    fn running_twice_keeps_one_default_folder() {
        let mut db = SqliteBackend::in_memory().unwrap();
        ensure_schema(&mut db).unwrap();
        assert_eq!(ensure_schema(&mut db).unwrap(), SchemaStatus::Ready);

        let rows = db.query("SELECT COUNT(*) FROM folders", &[]).unwrap();
        assert_eq!(rows[0].int(0).unwrap(), 1);
    }

    fn count(db: &mut SqliteBackend, sql: &str) -> i64 {
        db.query(sql, &[]).unwrap()[0].int(0).unwrap()
    }

    #[test]
    fn populated_database_is_left_alone() {
        let mut db = SqliteBackend::in_memory().unwrap();
        ensure_schema(&mut db).unwrap();
        let work = db
            .insert_returning_id("INSERT INTO folders (name) VALUES (?)", &["Work".into()])
            .unwrap();
        for (folder, title) in [(DEFAULT_FOLDER_ID, "t1"), (work, "t2")] {
            db.execute(
                "INSERT INTO passwords (folder_id, title_encrypted, password_encrypted) \
                 VALUES (?, ?, ?)",
                &[folder.into(), title.into(), "p".into()],
            )
            .unwrap();
        }

        for _ in 0..2 {
            assert_eq!(ensure_schema(&mut db).unwrap(), SchemaStatus::Existing);
        }

        assert_eq!(count(&mut db, "SELECT COUNT(*) FROM passwords"), 2);
        assert_eq!(count(&mut db, "SELECT COUNT(*) FROM folders"), 2);
        assert_eq!(count(&mut db, "SELECT COUNT(*) FROM folders WHERE id = 1"), 1);
        let titles = db
            .query("SELECT title_encrypted FROM passwords ORDER BY id", &[])
            .unwrap();
        assert_eq!(titles[0].text(0).unwrap(), "t1");
        assert_eq!(titles[1].text(0).unwrap(), "t2");
    }

    #[test]
    fn user_folders_get_ids_after_the_default() {
        let mut db = SqliteBackend::in_memory().unwrap();
        ensure_schema(&mut db).unwrap();
        let id = db
            .insert_returning_id("INSERT INTO folders (name) VALUES (?)", &["Work".into()])
            .unwrap();
        assert!(id > DEFAULT_FOLDER_ID);
    }
}
