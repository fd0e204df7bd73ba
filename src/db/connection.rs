//! Backend connections.
//!
//! A client owns exactly one [`DbConnection`] at a time. Each variant wraps a
//! single driver connection (no pooling), so transaction statements issued on
//! it apply to every following statement until commit or rollback.

use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{DatabaseType, masked_connection_string};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Executor};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Backend-specific connection (one variant per supported driver).
#[derive(Debug)]
pub enum DbConnection {
    SQLite(SqliteConnection),
    MySql(MySqlConnection),
    #[cfg(feature = "oledb")]
    OleDb(crate::db::oledb::OdbcConnection),
}

impl DbConnection {
    /// Open a connection for the given backend.
    ///
    /// The whole connect handshake is bounded by `connect_timeout`.
    pub async fn open(
        db_type: DatabaseType,
        connection_string: &str,
        connect_timeout: Duration,
    ) -> DbResult<Self> {
        debug!(
            backend = %db_type,
            connection = %masked_connection_string(connection_string),
            "Opening connection"
        );

        match db_type {
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::from_str(connection_string)
                    .map_err(|e| {
                        DbError::connection(
                            format!("Invalid SQLite connection string: {}", e),
                            format!(
                                "Check the connection URL format: {}",
                                db_type.connection_string_hint()
                            ),
                        )
                    })?
                    .create_if_missing(true);

                let conn = with_timeout(
                    "connect",
                    connect_timeout,
                    SqliteConnection::connect_with(&options),
                )
                .await?
                .map_err(|e| connect_error(db_type, e))?;
                Ok(DbConnection::SQLite(conn))
            }
            DatabaseType::MySQL => {
                let options = MySqlConnectOptions::from_str(connection_string)
                    .map_err(|e| {
                        DbError::connection(
                            format!("Invalid MySQL connection string: {}", e),
                            format!(
                                "Check the connection URL format: {}",
                                db_type.connection_string_hint()
                            ),
                        )
                    })?
                    .charset("utf8mb4");

                let conn = with_timeout(
                    "connect",
                    connect_timeout,
                    MySqlConnection::connect_with(&options),
                )
                .await?
                .map_err(|e| connect_error(db_type, e))?;
                Ok(DbConnection::MySql(conn))
            }
            #[cfg(feature = "oledb")]
            DatabaseType::OleDb => {
                let conn = crate::db::oledb::OdbcConnection::connect(connection_string)?;
                Ok(DbConnection::OleDb(conn))
            }
            #[cfg(not(feature = "oledb"))]
            DatabaseType::OleDb => Err(DbError::unsupported_backend(
                db_type.display_name(),
                "this build was compiled without the `oledb` feature",
            )),
        }
    }

    /// Get the backend type of this connection.
    pub fn db_type(&self) -> DatabaseType {
        impl_db_dispatch!(self, {
            SQLite(_c) => DatabaseType::SQLite,
            MySql(_c) => DatabaseType::MySQL,
            #[cfg(feature = "oledb")]
            OleDb(_c) => DatabaseType::OleDb,
        })
    }

    /// Close the connection, flushing any driver-side state.
    pub async fn close(self) -> DbResult<()> {
        impl_db_dispatch!(self, {
            SQLite(c) => c.close().await.map_err(DbError::from),
            MySql(c) => c.close().await.map_err(DbError::from),
            #[cfg(feature = "oledb")]
            OleDb(c) => {
                drop(c);
                Ok(())
            },
        })
    }

    /// Check that the connection is still usable.
    pub async fn ping(&mut self, limit: Duration) -> DbResult<()> {
        impl_db_dispatch!(self, {
            SQLite(c) => with_timeout("ping", limit, c.ping()).await?.map_err(DbError::from),
            MySql(c) => with_timeout("ping", limit, c.ping()).await?.map_err(DbError::from),
            #[cfg(feature = "oledb")]
            OleDb(c) => c.ping(),
        })
    }

    /// Start a transaction on this connection.
    pub async fn begin(&mut self, limit: Duration) -> DbResult<()> {
        impl_db_dispatch!(self, {
            SQLite(c) => raw_statement(&mut *c, "BEGIN", limit).await,
            MySql(c) => raw_statement(&mut *c, "START TRANSACTION", limit).await,
            #[cfg(feature = "oledb")]
            OleDb(c) => c.begin(),
        })
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self, limit: Duration) -> DbResult<()> {
        impl_db_dispatch!(self, {
            SQLite(c) => raw_statement(&mut *c, "COMMIT", limit).await,
            MySql(c) => raw_statement(&mut *c, "COMMIT", limit).await,
            #[cfg(feature = "oledb")]
            OleDb(c) => c.commit(),
        })
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self, limit: Duration) -> DbResult<()> {
        impl_db_dispatch!(self, {
            SQLite(c) => raw_statement(&mut *c, "ROLLBACK", limit).await,
            MySql(c) => raw_statement(&mut *c, "ROLLBACK", limit).await,
            #[cfg(feature = "oledb")]
            OleDb(c) => c.rollback(),
        })
    }
}

/// Execute a transaction-control statement without preparing it.
async fn raw_statement<'c, E>(executor: E, sql: &'static str, limit: Duration) -> DbResult<()>
where
    E: Executor<'c>,
{
    with_timeout(sql, limit, executor.execute(sql))
        .await?
        .map(|_| ())
        .map_err(DbError::from)
}

/// Run a driver future under a timeout.
pub(crate) async fn with_timeout<F: std::future::Future>(
    operation: &str,
    limit: Duration,
    fut: F,
) -> DbResult<F::Output> {
    timeout(limit, fut)
        .await
        .map_err(|_| DbError::timeout(operation, limit.as_millis() as u64))
}

fn connect_error(db_type: DatabaseType, error: sqlx::Error) -> DbError {
    DbError::connection(
        format!("Failed to connect: {}", error),
        connection_suggestion(db_type, &error.to_string()),
    )
}

/// Generate a helpful suggestion for connection errors.
pub(crate) fn connection_suggestion(db_type: DatabaseType, error: &str) -> String {
    let error_str = error.to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("access denied")
        || error_str.contains("authentication")
        || error_str.contains("password")
    {
        return "Verify the username and password in the connection string".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("unable to open") {
        return "Check that the directory of the database file exists and is writable"
            .to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    format!(
        "Verify the connection string format: {}",
        db_type.connection_string_hint()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_open_sqlite_memory() {
        let mut conn = DbConnection::open(DatabaseType::SQLite, "sqlite::memory:", LIMIT)
            .await
            .unwrap();
        assert_eq!(conn.db_type(), DatabaseType::SQLite);
        conn.ping(LIMIT).await.unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_sqlite_rejects_bad_options() {
        let err = DbConnection::open(DatabaseType::SQLite, "sqlite::memory:?bogus=1", LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_open_sqlite_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("db.sqlite");
        let err = DbConnection::open(
            DatabaseType::SQLite,
            &format!("sqlite:{}", path.display()),
            LIMIT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_transaction_statements() {
        let mut conn = DbConnection::open(DatabaseType::SQLite, "sqlite::memory:", LIMIT)
            .await
            .unwrap();
        conn.begin(LIMIT).await.unwrap();
        conn.rollback(LIMIT).await.unwrap();
        // No transaction left to commit
        assert!(conn.commit(LIMIT).await.is_err());
    }

    #[cfg(not(feature = "oledb"))]
    #[tokio::test]
    async fn test_oledb_requires_feature() {
        let err = DbConnection::open(DatabaseType::OleDb, "Driver={x};", LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedBackend { .. }));
    }

    #[test]
    fn test_connection_suggestion() {
        assert!(
            connection_suggestion(DatabaseType::MySQL, "Connection refused (os error 111)")
                .contains("MySQL server is running")
        );
        assert!(
            connection_suggestion(DatabaseType::MySQL, "Access denied for user")
                .contains("username and password")
        );
        assert!(
            connection_suggestion(DatabaseType::SQLite, "something else").contains("sqlite:")
        );
    }
}
