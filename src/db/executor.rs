//! Query execution engine.
//!
//! This module runs statements on a [`DbConnection`] with support for:
//! - Named and positional parameters
//! - Per-statement timeouts
//! - Fully materialized results
//!
//! # Architecture
//!
//! The executor uses backend-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific query and write operations
//! - `sqlite`: SQLite-specific query and write operations
//!
//! OleDb statements are forwarded to the blocking ODBC connection.

use crate::db::connection::{DbConnection, with_timeout};
use crate::db::params::{self, BoundSql};
use crate::db::types::RowToValues;
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{Column, Param, Table};
use std::time::{Duration, Instant};
use tracing::debug;

/// Query executor that runs statements under a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Timeout applied to every driver call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a statement and return its full result.
    ///
    /// Statements that return no rows still report their columns when the
    /// driver can describe them. Statements without a result set produce an
    /// empty table.
    pub async fn fetch_table(
        &self,
        conn: &mut DbConnection,
        sql: &str,
        params: &[Param],
    ) -> DbResult<Table> {
        let start = Instant::now();
        let bound = params::resolve(sql, params, conn.db_type())?;

        debug!(
            sql = %bound.sql,
            params = bound.values.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Executing query"
        );

        let table = impl_db_dispatch!(conn, {
            SQLite(c) => sqlite::fetch_table(c, &bound, self.timeout).await?,
            MySql(c) => mysql::fetch_table(c, &bound, self.timeout).await?,
            #[cfg(feature = "oledb")]
            OleDb(c) => c.fetch_table(&bound.sql, &bound.values, self.timeout)?,
        });

        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query finished"
        );
        Ok(table)
    }

    /// Execute a non-query statement and return the number of affected rows.
    pub async fn execute(
        &self,
        conn: &mut DbConnection,
        sql: &str,
        params: &[Param],
    ) -> DbResult<u64> {
        let start = Instant::now();
        let bound = params::resolve(sql, params, conn.db_type())?;

        debug!(
            sql = %bound.sql,
            params = bound.values.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Executing write operation"
        );

        let rows_affected = impl_db_dispatch!(conn, {
            SQLite(c) => sqlite::execute(c, &bound, self.timeout).await?,
            MySql(c) => mysql::execute(c, &bound, self.timeout).await?,
            #[cfg(feature = "oledb")]
            OleDb(c) => c.execute(&bound.sql, &bound.values, self.timeout)?,
        });

        debug!(
            rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Write finished"
        );
        Ok(rows_affected)
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn rows_to_table<R: RowToValues>(rows: Vec<R>) -> Table {
    let columns = rows.first().map(|r| r.column_info()).unwrap_or_default();
    let rows = rows.iter().map(|r| r.to_values()).collect();
    Table::new(columns, rows)
}

fn describe_columns<C: sqlx::Column>(columns: &[C]) -> Vec<Column> {
    use sqlx::TypeInfo;

    columns
        .iter()
        .map(|c| Column::new(c.name(), c.type_info().name()))
        .collect()
}

// =============================================================================
// Backend-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its driver.
// The code structure is intentionally parallel to make differences obvious.

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_value;
    use sqlx::{Executor, SqliteConnection, Statement};

    pub async fn fetch_table(
        conn: &mut SqliteConnection,
        bound: &BoundSql<'_>,
        limit: Duration,
    ) -> DbResult<Table> {
        // When there are no values, use raw SQL so multi-statement scripts work
        let rows = if bound.values.is_empty() {
            with_timeout("query execution", limit, (&mut *conn).fetch_all(&*bound.sql)).await?
        } else {
            let mut query = sqlx::query(&bound.sql);
            for value in &bound.values {
                query = bind_sqlite_value(query, value);
            }
            with_timeout("query execution", limit, query.fetch_all(&mut *conn)).await?
        }
        .map_err(DbError::from)?;

        if !rows.is_empty() {
            return Ok(rows_to_table(rows));
        }

        // No rows: ask the driver for the column list; a failure here only
        // means the statement cannot be described
        let columns = match with_timeout("describe", limit, (&mut *conn).prepare(&bound.sql)).await
        {
            Ok(Ok(statement)) => describe_columns(statement.columns()),
            _ => Vec::new(),
        };
        Ok(Table::new(columns, Vec::new()))
    }

    pub async fn execute(
        conn: &mut SqliteConnection,
        bound: &BoundSql<'_>,
        limit: Duration,
    ) -> DbResult<u64> {
        let result = if bound.values.is_empty() {
            with_timeout("write operation", limit, (&mut *conn).execute(&*bound.sql)).await?
        } else {
            let mut query = sqlx::query(&bound.sql);
            for value in &bound.values {
                query = bind_sqlite_value(query, value);
            }
            with_timeout("write operation", limit, query.execute(&mut *conn)).await?
        };

        result.map(|r| r.rows_affected()).map_err(DbError::from)
    }
}

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_value;
    use sqlx::{Executor, MySqlConnection, Statement};

    pub async fn fetch_table(
        conn: &mut MySqlConnection,
        bound: &BoundSql<'_>,
        limit: Duration,
    ) -> DbResult<Table> {
        // When there are no values, use raw SQL to avoid prepared statement issues
        let rows = if bound.values.is_empty() {
            with_timeout("query execution", limit, (&mut *conn).fetch_all(&*bound.sql)).await?
        } else {
            let mut query = sqlx::query(&bound.sql);
            for value in &bound.values {
                query = bind_mysql_value(query, value);
            }
            with_timeout("query execution", limit, query.fetch_all(&mut *conn)).await?
        }
        .map_err(DbError::from)?;

        if !rows.is_empty() {
            return Ok(rows_to_table(rows));
        }

        let columns = match with_timeout("describe", limit, (&mut *conn).prepare(&bound.sql)).await
        {
            Ok(Ok(statement)) => describe_columns(statement.columns()),
            _ => Vec::new(),
        };
        Ok(Table::new(columns, Vec::new()))
    }

    pub async fn execute(
        conn: &mut MySqlConnection,
        bound: &BoundSql<'_>,
        limit: Duration,
    ) -> DbResult<u64> {
        // When there are no values, execute raw SQL directly
        // (some SQL like CREATE PROCEDURE doesn't support prepared statements)
        let result = if bound.values.is_empty() {
            with_timeout("write operation", limit, (&mut *conn).execute(&*bound.sql)).await?
        } else {
            let mut query = sqlx::query(&bound.sql);
            for value in &bound.values {
                query = bind_mysql_value(query, value);
            }
            with_timeout("write operation", limit, query.execute(&mut *conn)).await?
        };

        result.map(|r| r.rows_affected()).map_err(DbError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatabaseType, Value};

    async fn memory_connection() -> DbConnection {
        DbConnection::open(
            DatabaseType::SQLite,
            "sqlite::memory:",
            Duration::from_secs(5),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_table_with_named_params() {
        let executor = QueryExecutor::new(Duration::from_secs(5));
        let mut conn = memory_connection().await;

        executor
            .execute(
                &mut conn,
                "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, data BLOB)",
                &[],
            )
            .await
            .unwrap();

        let affected = executor
            .execute(
                &mut conn,
                "INSERT INTO t (name, score, data) VALUES (@name, @score, @data)",
                &[
                    Param::named("@data", vec![1u8, 2, 3]),
                    Param::named("@score", 1.5),
                    Param::named("@name", "alice"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let table = executor
            .fetch_table(&mut conn, "SELECT id, name, score, data FROM t", &[])
            .await
            .unwrap();
        assert_eq!(table.column_count(), 4);
        assert_eq!(table.columns[1].name, "name");
        assert_eq!(
            table.rows[0].0,
            vec![
                Value::Int(1),
                Value::from("alice"),
                Value::Float(1.5),
                Value::Bytes(vec![1, 2, 3]),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_table_zero_rows_keeps_columns() {
        let executor = QueryExecutor::new(Duration::from_secs(5));
        let mut conn = memory_connection().await;
        executor
            .execute(&mut conn, "CREATE TABLE t (a INTEGER, b TEXT)", &[])
            .await
            .unwrap();

        let table = executor
            .fetch_table(&mut conn, "SELECT a, b FROM t WHERE a = ?", &[Param::positional(1)])
            .await
            .unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 2);
        assert!(!table.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_table_non_query_is_empty() {
        let executor = QueryExecutor::new(Duration::from_secs(5));
        let mut conn = memory_connection().await;
        let table = executor
            .fetch_table(&mut conn, "CREATE TABLE t (a INTEGER)", &[])
            .await
            .unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_execute_reports_driver_errors() {
        let executor = QueryExecutor::new(Duration::from_secs(5));
        let mut conn = memory_connection().await;
        let err = executor
            .execute(&mut conn, "INSERT INTO missing VALUES (1)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Database { .. }));
    }
}
