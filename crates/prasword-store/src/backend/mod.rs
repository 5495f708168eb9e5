//! Backend adapter: one query interface over SQLite and PostgreSQL.
//!
//! Repository code writes every statement once, with `?` positional
//! placeholders, and hands it to a [`Backend`]. Each backend rewrites the
//! placeholders for its engine (see [`rewrite_placeholders`]) and exposes
//! the few dialect fragments the schema manager needs through
//! [`DdlTypes`]. Nothing above this module branches on the engine.

mod sqlite;

#[cfg(feature = "postgres")]
mod postgres;

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use sqlite::SqliteBackend;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

// ---------------------------------------------------------------------------
// Dialect
// ---------------------------------------------------------------------------

/// Which engine a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded file database.
    Sqlite,
    /// Client/server database reached over the network.
    Postgresql,
}

impl BackendKind {
    /// The tag stored next to a connection profile.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgresql => "postgresql",
        }
    }

    /// Positional parameter syntax understood by the engine.
    #[must_use]
    pub const fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Self::Sqlite => PlaceholderStyle::QuestionMark,
            Self::Postgresql => PlaceholderStyle::Numbered,
        }
    }

    /// Column type fragments for DDL.
    #[must_use]
    pub const fn ddl_types(self) -> DdlTypes {
        match self {
            Self::Sqlite => DdlTypes {
                id_column: "INTEGER PRIMARY KEY AUTOINCREMENT",
                blob: "BLOB",
            },
            Self::Postgresql => DdlTypes {
                id_column: "SERIAL PRIMARY KEY",
                blob: "BYTEA",
            },
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional parameter syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, `?`, `?`
    QuestionMark,
    /// `$1`, `$2`, `$3`
    Numbered,
}

/// Engine-specific column types used by the schema manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdlTypes {
    /// Auto-assigned integer primary key column definition.
    pub id_column: &'static str,
    /// Binary column type.
    pub blob: &'static str,
}

/// Rewrite `?` placeholders into the target engine's syntax.
///
/// Placeholders are numbered left to right. A `?` inside a single- or
/// double-quoted literal is left alone.
#[must_use]
pub fn rewrite_placeholders(sql: &str, style: PlaceholderStyle) -> Cow<'_, str> {
    if style == PlaceholderStyle::QuestionMark || !sql.contains('?') {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len().saturating_add(16));
    let mut index: u32 = 0;
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push(ch);
            }
            (Some(open), _) if ch == open => {
                quote = None;
                out.push(ch);
            }
            (None, '?') => {
                index = index.saturating_add(1);
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(ch),
        }
    }

    Cow::Owned(out)
}

// ---------------------------------------------------------------------------
// Values and rows
// ---------------------------------------------------------------------------

/// A typed, nullable SQL value used for parameters and result cells.
///
/// Nulls keep their column type so engines with strict parameter typing
/// (PostgreSQL) can bind them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// 64-bit integer.
    Integer(Option<i64>),
    /// UTF-8 text.
    Text(Option<String>),
    /// Raw bytes.
    Blob(Option<Vec<u8>>),
}

impl SqlValue {
    /// Returns `true` for any null variant.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Integer(None) | Self::Text(None) | Self::Blob(None))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(Some(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_string()))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<Option<&[u8]>> for SqlValue {
    fn from(v: Option<&[u8]>) -> Self {
        Self::Blob(v.map(<[u8]>::to_vec))
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(Some(v))
    }
}

/// One result row, cells in `SELECT` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    /// Wrap the cells of one result row.
    #[must_use]
    pub const fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn cell(&self, idx: usize) -> Result<&SqlValue, StoreError> {
        self.values
            .get(idx)
            .ok_or_else(|| StoreError::Database(format!("column index {idx} out of range")))
    }

    /// Read a non-null integer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a null, a type mismatch or a bad index.
    pub fn int(&self, idx: usize) -> Result<i64, StoreError> {
        match self.cell(idx)? {
            SqlValue::Integer(Some(v)) => Ok(*v),
            other => Err(StoreError::Database(format!(
                "column {idx}: expected integer, found {other:?}"
            ))),
        }
    }

    /// Read a non-null text cell.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a null, a type mismatch or a bad index.
    pub fn text(&self, idx: usize) -> Result<String, StoreError> {
        self.opt_text(idx)?
            .ok_or_else(|| StoreError::Database(format!("column {idx}: unexpected NULL")))
    }

    /// Read a nullable text cell.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a type mismatch or a bad index.
    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, StoreError> {
        match self.cell(idx)? {
            SqlValue::Text(v) => Ok(v.clone()),
            v if v.is_null() => Ok(None),
            other => Err(StoreError::Database(format!(
                "column {idx}: expected text, found {other:?}"
            ))),
        }
    }

    /// Read a nullable binary cell.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a type mismatch or a bad index.
    pub fn opt_blob(&self, idx: usize) -> Result<Option<Vec<u8>>, StoreError> {
        match self.cell(idx)? {
            SqlValue::Blob(v) => Ok(v.clone()),
            v if v.is_null() => Ok(None),
            other => Err(StoreError::Database(format!(
                "column {idx}: expected blob, found {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A live connection to one credential database.
///
/// Statements use `?` placeholders; implementations rewrite them for
/// their engine before dispatch.
pub trait Backend: Send {
    /// Which engine this backend talks to.
    fn kind(&self) -> BackendKind;

    /// Human-readable target with secrets removed, for logs.
    fn describe(&self) -> String;

    /// Positional parameter syntax of the engine.
    fn placeholder_style(&self) -> PlaceholderStyle {
        self.kind().placeholder_style()
    }

    /// Column type fragments for DDL.
    fn ddl_types(&self) -> DdlTypes {
        self.kind().ddl_types()
    }

    /// Run a statement and return the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the engine rejects the statement.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, StoreError>;

    /// Run a query and collect every row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the engine rejects the query.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError>;

    /// Run an `INSERT` into a table with an auto-assigned `id` column and
    /// return the new id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn insert_returning_id(&mut self, sql: &str, params: &[SqlValue])
        -> Result<i64, StoreError>;

    /// Whether `table` exists in the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the catalog query fails.
    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError>;

    /// Move the id generator of `table` past its largest id, after rows
    /// were inserted with explicit ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the engine rejects the update.
    fn sync_id_sequence(&mut self, table: &str) -> Result<(), StoreError>;

    /// Start a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a transaction cannot be opened.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Commit the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the commit fails.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Roll back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the rollback fails.
    fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
///
/// # Errors
///
/// Returns the error from `f`, or from `begin`/`commit`.
pub fn in_transaction<T, F>(backend: &mut dyn Backend, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut dyn Backend) -> Result<T, StoreError>,
{
    backend.begin()?;
    match f(&mut *backend) {
        Ok(value) => {
            backend.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = backend.rollback() {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Connection configuration
// ---------------------------------------------------------------------------

const fn default_pg_port() -> u16 {
    5432
}

/// Network parameters for a PostgreSQL database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    #[serde(default = "default_pg_port")]
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Where a credential database lives.
///
/// Serialized in the profile record shape: `{"type": "sqlite", "path": …}`
/// or `{"type": "postgresql", "config": {…}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Local database file.
    Sqlite {
        /// Path to the database file.
        path: PathBuf,
    },
    /// Remote database.
    Postgresql {
        /// Network parameters.
        config: PostgresConfig,
    },
}

impl BackendConfig {
    /// Engine of this target.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Sqlite { .. } => BackendKind::Sqlite,
            Self::Postgresql { .. } => BackendKind::Postgresql,
        }
    }

    /// Open a connection for a new database. A SQLite file is created if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the target cannot be reached.
    pub fn create(&self) -> Result<Box<dyn Backend>, StoreError> {
        match self {
            Self::Sqlite { path } => Ok(Box::new(SqliteBackend::create(path)?)),
            Self::Postgresql { config } => open_postgres(config),
        }
    }

    /// Open a connection to an existing database. A missing SQLite file is
    /// a connection failure.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the target cannot be reached.
    pub fn connect(&self) -> Result<Box<dyn Backend>, StoreError> {
        match self {
            Self::Sqlite { path } => Ok(Box::new(SqliteBackend::connect(path)?)),
            Self::Postgresql { config } => open_postgres(config),
        }
    }

    /// Short description with the sensitive parts obscured, for lists.
    #[must_use]
    pub fn obscured(&self) -> String {
        match self {
            Self::Sqlite { path } => {
                let shown = path.display().to_string();
                let count = shown.chars().count();
                if count > 30 {
                    let tail: String = shown.chars().skip(count.saturating_sub(27)).collect();
                    format!("...{tail}")
                } else {
                    shown
                }
            }
            Self::Postgresql { config } => format!("{}/••••••", config.host),
        }
    }
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &PostgresConfig) -> Result<Box<dyn Backend>, StoreError> {
    Ok(Box::new(PostgresBackend::connect(config)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(config: &PostgresConfig) -> Result<Box<dyn Backend>, StoreError> {
    Err(StoreError::Connection(format!(
        "cannot reach {}: built without PostgreSQL support",
        config.host
    )))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_mark_style_is_untouched() {
        let sql = "SELECT * FROM folders WHERE id = ?";
        assert!(matches!(
            rewrite_placeholders(sql, PlaceholderStyle::QuestionMark),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn numbered_style_counts_left_to_right() {
        let sql = "UPDATE passwords SET folder_id = ? WHERE folder_id = ?";
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Numbered),
            "UPDATE passwords SET folder_id = $1 WHERE folder_id = $2"
        );
    }

    #[test]
    fn quoted_question_marks_are_preserved() {
        let sql = "SELECT '?', \"a?b\" FROM t WHERE x = ? AND y = 'it''s?' AND z = ?";
        assert_eq!(
            rewrite_placeholders(sql, PlaceholderStyle::Numbered),
            "SELECT '?', \"a?b\" FROM t WHERE x = $1 AND y = 'it''s?' AND z = $2"
        );
    }

    #[test]
    fn backends_report_their_engine_placeholder_style() {
        let sqlite = SqliteBackend::in_memory().unwrap();
        assert_eq!(sqlite.placeholder_style(), PlaceholderStyle::QuestionMark);
        assert_eq!(
            BackendKind::Postgresql.placeholder_style(),
            PlaceholderStyle::Numbered
        );
    }

    #[test]
    fn sqlite_and_postgres_ddl_differ() {
        assert_eq!(BackendKind::Sqlite.ddl_types().blob, "BLOB");
        assert_eq!(BackendKind::Postgresql.ddl_types().blob, "BYTEA");
        assert!(BackendKind::Postgresql
            .ddl_types()
            .id_column
            .starts_with("SERIAL"));
    }

    #[test]
    fn row_accessors_treat_any_null_as_null() {
        let row = Row::new(vec![
            SqlValue::Integer(Some(7)),
            SqlValue::Text(None),
            SqlValue::Blob(None),
            SqlValue::Text(Some("x".into())),
        ]);
        assert_eq!(row.int(0).unwrap(), 7);
        assert_eq!(row.opt_text(1).unwrap(), None);
        assert_eq!(row.opt_text(2).unwrap(), None);
        assert_eq!(row.opt_blob(1).unwrap(), None);
        assert_eq!(row.text(3).unwrap(), "x");
        assert!(row.text(1).is_err());
        assert!(row.int(3).is_err());
        assert!(row.int(9).is_err());
    }

    #[test]
    fn backend_config_uses_profile_record_shape() {
        let sqlite: BackendConfig =
            serde_json::from_str(r#"{"type":"sqlite","path":"/tmp/p.db"}"#).unwrap();
        assert_eq!(sqlite.kind(), BackendKind::Sqlite);

        let pg: BackendConfig = serde_json::from_str(
            r#"{"type":"postgresql","config":{"host":"db","port":5433,"database":"pw","user":"u","password":"p"}}"#,
        )
        .unwrap();
        assert_eq!(pg.kind(), BackendKind::Postgresql);
        assert_eq!(pg.obscured(), "db/••••••");
    }

    #[test]
    fn postgres_config_debug_hides_password() {
        let config = PostgresConfig {
            host: "localhost".into(),
            port: 5432,
            database: "pw".into(),
            user: "alice".into(),
            password: "s3cret".into(),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn long_sqlite_paths_are_shortened() {
        let config = BackendConfig::Sqlite {
            path: PathBuf::from("/home/alice/very/deeply/nested/folder/passwords.db"),
        };
        let shown = config.obscured();
        assert!(shown.starts_with("..."));
        assert_eq!(shown.chars().count(), 30);
    }
}
