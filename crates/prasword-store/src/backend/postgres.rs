//! PostgreSQL backend (sqlx).
//!
//! The store API is blocking, so the backend owns a current-thread tokio
//! runtime and drives a single connection with `block_on`. Calls must not
//! be made from inside another async executor.

use std::fmt;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _, TypeInfo};
use tokio::runtime::Runtime;

use super::{rewrite_placeholders, Backend, BackendKind, PostgresConfig, Row, SqlValue};
use crate::error::StoreError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_all<'q>(sql: &'q str, params: &[SqlValue]) -> PgQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match param {
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Blob(v) => query.bind(v.clone()),
        })
}

fn convert_row(row: &PgRow) -> Result<Row, StoreError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT2" => SqlValue::Integer(row.try_get::<Option<i16>, _>(idx)?.map(i64::from)),
            "INT4" => SqlValue::Integer(row.try_get::<Option<i32>, _>(idx)?.map(i64::from)),
            "INT8" => SqlValue::Integer(row.try_get::<Option<i64>, _>(idx)?),
            "BOOL" => SqlValue::Integer(row.try_get::<Option<bool>, _>(idx)?.map(i64::from)),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                SqlValue::Text(row.try_get::<Option<String>, _>(idx)?)
            }
            "BYTEA" => SqlValue::Blob(row.try_get::<Option<Vec<u8>>, _>(idx)?),
            other => {
                return Err(StoreError::Database(format!(
                    "unsupported column type {other} for {}",
                    column.name()
                )))
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single connection to a PostgreSQL database.
pub struct PostgresBackend {
    // Dropped before the runtime that drives it.
    conn: PgConnection,
    runtime: Runtime,
    target: String,
}

impl fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Connect with the given network parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] on network, authentication or
    /// timeout failure.
    pub fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Connection(format!("failed to start runtime: {e}")))?;

        let conn = runtime.block_on(open(config))?;
        let target = format!("postgresql://{}:{}/{}", config.host, config.port, config.database);
        tracing::debug!(target = %target, "postgres connection established");

        Ok(Self {
            conn,
            runtime,
            target,
        })
    }

    /// Check that a server is reachable and accepts the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] describing why the check failed.
    pub fn test_connection(config: &PostgresConfig) -> Result<(), StoreError> {
        let mut backend = Self::connect(config)?;
        backend
            .runtime
            .block_on(backend.conn.ping())
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

async fn open(config: &PostgresConfig) -> Result<PgConnection, StoreError> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .disable_statement_logging();

    match tokio::time::timeout(CONNECT_TIMEOUT, options.connect()).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(StoreError::Connection(e.to_string())),
        Err(_) => Err(StoreError::Connection(format!(
            "timed out after {}s connecting to {}:{}",
            CONNECT_TIMEOUT.as_secs(),
            config.host,
            config.port
        ))),
    }
}

impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgresql
    }

    fn describe(&self) -> String {
        self.target.clone()
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, StoreError> {
        let sql = rewrite_placeholders(sql, self.placeholder_style());
        let query = bind_all(&sql, params);
        let result = self.runtime.block_on(query.execute(&mut self.conn))?;
        Ok(result.rows_affected())
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        let sql = rewrite_placeholders(sql, self.placeholder_style());
        let query = bind_all(&sql, params);
        let rows = self.runtime.block_on(query.fetch_all(&mut self.conn))?;
        rows.iter().map(convert_row).collect()
    }

    fn insert_returning_id(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<i64, StoreError> {
        let sql = format!(
            "{} RETURNING id",
            rewrite_placeholders(sql, self.placeholder_style())
        );
        let query = bind_all(&sql, params);
        let row = self.runtime.block_on(query.fetch_one(&mut self.conn))?;
        convert_row(&row)?.int(0)
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let rows = self.query(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = ?",
            &[table.into()],
        )?;
        let count = rows.first().map_or(Ok(0), |row| row.int(0))?;
        Ok(count > 0)
    }

    fn sync_id_sequence(&mut self, table: &str) -> Result<(), StoreError> {
        if !is_identifier(table) {
            return Err(StoreError::InvalidInput(format!(
                "not a table name: {table}"
            )));
        }
        let sql = format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
             COALESCE((SELECT MAX(id) FROM {table}), 1))"
        );
        self.runtime
            .block_on(sqlx::query(&sql).execute(&mut self.conn))?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.runtime
            .block_on(sqlx::raw_sql("BEGIN").execute(&mut self.conn))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.runtime
            .block_on(sqlx::raw_sql("COMMIT").execute(&mut self.conn))?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.runtime
            .block_on(sqlx::raw_sql("ROLLBACK").execute(&mut self.conn))?;
        Ok(())
    }
}
