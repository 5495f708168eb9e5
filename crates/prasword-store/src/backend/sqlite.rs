//! Embedded SQLite backend (rusqlite, bundled).

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};

use super::{Backend, BackendKind, Row, SqlValue};
use crate::error::StoreError;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Integer(Some(v)) => ToSqlOutput::Owned(Value::Integer(*v)),
            Self::Text(Some(v)) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Self::Blob(Some(v)) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Self::Integer(None) | Self::Text(None) | Self::Blob(None) => {
                ToSqlOutput::Owned(Value::Null)
            }
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Text(None),
        ValueRef::Integer(v) => SqlValue::Integer(Some(v)),
        ValueRef::Real(v) => SqlValue::Text(Some(v.to_string())),
        ValueRef::Text(v) => SqlValue::Text(Some(String::from_utf8_lossy(v).into_owned())),
        ValueRef::Blob(v) => SqlValue::Blob(Some(v.to_vec())),
    }
}

/// Connection to a single SQLite database file.
pub struct SqliteBackend {
    conn: Connection,
    path: Option<PathBuf>,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open `path`, creating the file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the file cannot be opened.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", path.display())))?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// Open an existing database file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the file is missing or is not
    /// a SQLite database.
    pub fn connect(path: &Path) -> Result<Self, StoreError> {
        if !path.is_file() {
            return Err(StoreError::Connection(format!(
                "database file not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Connection(format!("{}: {e}", path.display())))?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if SQLite cannot allocate it.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::configure(conn, None)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        // A non-database file only fails on first read.
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")?;
        if path.is_some() {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, path })
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn describe(&self) -> String {
        self.path.as_ref().map_or_else(
            || "sqlite::memory:".to_string(),
            |p| format!("sqlite:{}", p.display()),
        )
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, StoreError> {
        let changed = self.conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns);
            for idx in 0..columns {
                values.push(from_value_ref(row.get_ref(idx)?));
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }

    fn insert_returning_id(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<i64, StoreError> {
        self.conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn sync_id_sequence(&mut self, _table: &str) -> Result<(), StoreError> {
        // AUTOINCREMENT already tracks the largest id ever inserted.
        Ok(())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}
