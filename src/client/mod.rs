//! The database client.
//!
//! [`DbClient`] owns one lazily opened connection, the transaction state on
//! that connection and a compatibility view of the last error. The connection
//! is closed after every operation unless a transaction is active or the
//! keep-open flag is set.

mod binary;

use crate::db::{DbConnection, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{
    ClientConfig, ColumnValues, DatabaseType, FromCell, Param, Row, Statement, Table,
    TransactionState, masked_connection_string,
};
use std::time::Duration;
use tracing::{debug, info, warn};

type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

pub struct DbClient {
    config: ClientConfig,
    connection: Option<DbConnection>,
    transaction: TransactionState,
    last_error: Option<String>,
    error_callback: Option<ErrorCallback>,
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("config", &self.config)
            .field("connection_active", &self.connection.is_some())
            .field("transaction", &self.transaction)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl DbClient {
    /// Create a client with no connection string.
    pub fn new(db_type: DatabaseType) -> Self {
        Self::from_config(ClientConfig::new(db_type))
    }

    /// Create a client from a configuration.
    ///
    /// The connection string is stored as given and not probed; the first
    /// operation that opens the connection reports any problem with it.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
            transaction: TransactionState::Idle,
            last_error: None,
            error_callback: None,
        }
    }

    /// Create a client and validate the connection string.
    ///
    /// A rejected connection string is not stored; the failure is available
    /// through [`last_error`](Self::last_error).
    pub async fn connect(db_type: DatabaseType, connection_string: &str) -> Self {
        let mut client = Self::new(db_type);
        // Recorded in last_error
        let _ = client.set_connection_string(connection_string).await;
        client
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn db_type(&self) -> DatabaseType {
        self.config.db_type
    }

    pub fn connection_string(&self) -> Option<&str> {
        self.config.connection_string.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Set the operation timeout. A zero duration is ignored.
    pub fn set_timeout(&mut self, timeout: Duration) {
        let millis = timeout.as_millis().min(u64::MAX as u128) as u64;
        if millis > 0 {
            self.config.timeout_ms = millis;
        }
    }

    pub fn keep_open(&self) -> bool {
        self.config.keep_open
    }

    /// Keep the connection open between operations.
    pub fn set_keep_open(&mut self, keep_open: bool) {
        self.config.keep_open = keep_open;
    }

    /// Register a callback that receives every recorded error message.
    pub fn on_error<F>(&mut self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.error_callback = Some(Box::new(callback));
    }

    /// Message of the error recorded by the most recent operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_connection_active(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Validate and store a connection string.
    ///
    /// A throwaway connection is opened and closed with `connection_string`.
    /// Only on success is the string retained; on failure the previous value
    /// is kept.
    pub async fn set_connection_string(&mut self, connection_string: &str) -> DbResult<()> {
        self.clear_error();
        let result = self.probe(connection_string).await;
        if result.is_ok() {
            info!(
                backend = %self.config.db_type,
                connection = %masked_connection_string(connection_string),
                "Connection string accepted"
            );
            self.config.connection_string = Some(connection_string.to_string());
            // An idle connection still points at the old database
            if !self.transaction.is_active() {
                self.drop_connection().await;
            }
        }
        self.record(result)
    }

    /// Check that a connection string can be opened, without storing it.
    pub async fn test_connection(&mut self, connection_string: &str) -> DbResult<()> {
        self.clear_error();
        let result = self.probe(connection_string).await;
        self.record(result)
    }

    /// Open the working connection if it is not open yet.
    pub async fn open(&mut self) -> DbResult<()> {
        self.clear_error();
        let result = self.ensure_open().await.map(|_| ());
        self.record(result)
    }

    /// Close the working connection.
    ///
    /// Does nothing while a transaction is active; the connection is released
    /// by commit or rollback instead.
    pub async fn close(&mut self) -> DbResult<()> {
        self.clear_error();
        if self.transaction.is_active() {
            debug!("Close suppressed while a transaction is active");
            return Ok(());
        }
        let result = match self.connection.take() {
            Some(conn) => conn.close().await,
            None => Ok(()),
        };
        self.record(result)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Run a query and return the whole result.
    pub async fn select_table(&mut self, sql: &str, params: &[Param]) -> DbResult<Table> {
        self.clear_error();
        let result = self.run_query(sql, params).await;
        self.finish(result).await
    }

    /// Return the only row of the result, or `None` unless there is exactly one.
    pub async fn select_row(&mut self, sql: &str, params: &[Param]) -> DbResult<Option<Row>> {
        let table = self.select_table(sql, params).await?;
        if table.row_count() != 1 {
            return Ok(None);
        }
        Ok(table.rows.into_iter().next())
    }

    /// Return the row at `index`, or `None` when out of range.
    pub async fn select_row_at(
        &mut self,
        sql: &str,
        index: usize,
        params: &[Param],
    ) -> DbResult<Option<Row>> {
        let table = self.select_table(sql, params).await?;
        Ok(table.rows.into_iter().nth(index))
    }

    /// Return the only column of the result, or `None` unless there is exactly one.
    pub async fn select_column(
        &mut self,
        sql: &str,
        params: &[Param],
    ) -> DbResult<Option<ColumnValues>> {
        let table = self.select_table(sql, params).await?;
        if table.column_count() != 1 {
            return Ok(None);
        }
        Ok(table.column(0))
    }

    /// Return the column at `index`, or `None` when out of range.
    pub async fn select_column_at(
        &mut self,
        sql: &str,
        index: usize,
        params: &[Param],
    ) -> DbResult<Option<ColumnValues>> {
        let table = self.select_table(sql, params).await?;
        Ok(table.column(index))
    }

    /// Return the single value of a 1x1 result, converted to `T`.
    ///
    /// # Errors
    ///
    /// - `EmptyResult` when the statement produced no rows and no columns
    /// - `CellShape` for any other shape than one row by one column
    /// - `CellType` when `T` does not accept the value
    pub async fn select_cell<T: FromCell>(&mut self, sql: &str, params: &[Param]) -> DbResult<T> {
        let table = self.select_table(sql, params).await?;
        let result = table.into_cell().and_then(T::try_from_cell);
        self.record(result)
    }

    /// Like [`select_cell`](Self::select_cell) but yields `default` on any failure.
    ///
    /// The failure is still recorded in [`last_error`](Self::last_error).
    pub async fn select_cell_or<T: FromCell>(
        &mut self,
        sql: &str,
        default: T,
        params: &[Param],
    ) -> T {
        self.select_cell(sql, params).await.unwrap_or(default)
    }

    // =========================================================================
    // Non-query statements
    // =========================================================================

    /// Run a non-query statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: &[Param]) -> DbResult<u64> {
        self.clear_error();
        let result = self.run_execute(sql, params).await;
        self.finish(result).await
    }

    /// Run an UPDATE statement.
    pub async fn update(&mut self, sql: &str, params: &[Param]) -> DbResult<u64> {
        self.execute(sql, params).await
    }

    /// Run an INSERT statement.
    pub async fn insert(&mut self, sql: &str, params: &[Param]) -> DbResult<u64> {
        self.execute(sql, params).await
    }

    /// Run a DELETE statement.
    pub async fn delete(&mut self, sql: &str, params: &[Param]) -> DbResult<u64> {
        self.execute(sql, params).await
    }

    /// Run several statements atomically and return the total rows affected.
    ///
    /// Outside a transaction the batch gets its own, rolled back on the first
    /// failure. Inside an active transaction the statements simply join it.
    pub async fn execute_batch(&mut self, statements: &[Statement]) -> DbResult<u64> {
        self.clear_error();
        let result = self.run_batch(statements).await;
        self.finish(result).await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a transaction on the working connection.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        self.clear_error();
        if self.transaction.is_active() {
            return self.record(Err(DbError::TransactionActive));
        }

        let limit = self.timeout();
        let result = match self.ensure_open().await {
            Ok(conn) => conn.begin(limit).await,
            Err(e) => Err(e),
        };

        if result.is_ok() {
            self.transaction = TransactionState::Active;
            info!(backend = %self.config.db_type, "Transaction started");
        }
        self.finish(result).await
    }

    /// Commit the active transaction.
    pub async fn commit_transaction(&mut self) -> DbResult<()> {
        self.end_transaction(true).await
    }

    /// Roll back the active transaction.
    pub async fn rollback_transaction(&mut self) -> DbResult<()> {
        self.end_transaction(false).await
    }

    async fn end_transaction(&mut self, commit: bool) -> DbResult<()> {
        self.clear_error();
        let action = if commit { "commit" } else { "rollback" };

        let (true, Some(conn)) = (self.transaction.is_active(), self.connection.as_mut()) else {
            self.transaction = TransactionState::Idle;
            return self.record(Err(DbError::NoActiveTransaction));
        };

        let limit = self.config.timeout();
        let result = if commit {
            conn.commit(limit).await
        } else {
            conn.rollback(limit).await
        };
        self.transaction = TransactionState::Idle;

        match &result {
            Ok(()) => info!(action, "Transaction finished"),
            Err(e) => {
                // The driver state is unknown; never reuse the connection
                warn!(action, error = %e, "Transaction end failed, dropping connection");
                self.connection = None;
            }
        }
        self.finish(result).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(self.config.timeout())
    }

    async fn probe(&self, connection_string: &str) -> DbResult<()> {
        let conn =
            DbConnection::open(self.config.db_type, connection_string, self.timeout()).await?;
        conn.close().await
    }

    async fn ensure_open(&mut self) -> DbResult<&mut DbConnection> {
        // A kept-open connection may have been closed by the server meanwhile.
        // Inside a transaction a dead connection must surface as an error.
        if !self.transaction.is_active() {
            if let Some(conn) = self.connection.as_mut() {
                if let Err(e) = conn.ping(self.config.timeout()).await {
                    debug!(error = %e, "Kept connection is gone, reopening");
                    self.connection = None;
                }
            }
        }

        if self.connection.is_none() {
            let connection_string = self
                .config
                .connection_string
                .as_deref()
                .ok_or(DbError::NotConfigured)?;
            let conn =
                DbConnection::open(self.config.db_type, connection_string, self.timeout()).await?;
            debug!(backend = %self.config.db_type, "Connection opened");
            self.connection = Some(conn);
        }
        self.connection
            .as_mut()
            .ok_or_else(|| DbError::internal("connection missing after open"))
    }

    async fn run_query(&mut self, sql: &str, params: &[Param]) -> DbResult<Table> {
        let executor = self.executor();
        let conn = self.ensure_open().await?;
        executor.fetch_table(conn, sql, params).await
    }

    async fn run_execute(&mut self, sql: &str, params: &[Param]) -> DbResult<u64> {
        let executor = self.executor();
        let conn = self.ensure_open().await?;
        executor.execute(conn, sql, params).await
    }

    async fn run_batch(&mut self, statements: &[Statement]) -> DbResult<u64> {
        let executor = self.executor();
        let limit = executor.timeout();
        let joined = self.transaction.is_active();
        let conn = self.ensure_open().await?;

        if !joined {
            conn.begin(limit).await?;
        }

        let mut total = 0;
        for statement in statements {
            match executor.execute(conn, &statement.sql, &statement.params).await {
                Ok(n) => total += n,
                Err(e) => {
                    if !joined {
                        if let Err(rollback_err) = conn.rollback(limit).await {
                            warn!(error = %rollback_err, "Batch rollback failed, dropping connection");
                            self.connection = None;
                        }
                    }
                    return Err(e);
                }
            }
        }

        if !joined {
            if let Err(e) = conn.commit(limit).await {
                // The batch transaction may still be open on the driver side
                warn!(error = %e, "Batch commit failed, dropping connection");
                self.connection = None;
                return Err(e);
            }
        }
        debug!(statements = statements.len(), rows_affected = total, "Batch committed");
        Ok(total)
    }

    /// Release the connection after an operation and record its outcome.
    async fn finish<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(DbError::Timeout { operation, .. }) = &result {
            warn!(
                operation = %operation,
                transaction = self.transaction.is_active(),
                "Timed out, discarding connection"
            );
            // Dropping the connection makes the driver roll back any open transaction
            self.connection = None;
            self.transaction = TransactionState::Idle;
        }
        self.release().await;
        self.record(result)
    }

    async fn release(&mut self) {
        if self.transaction.is_active() || self.config.keep_open {
            return;
        }
        self.drop_connection().await;
    }

    async fn drop_connection(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "Error while closing connection");
            }
        }
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn record<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            let message = e.to_string();
            warn!(backend = %self.config.db_type, error = %message, "Operation failed");
            if let Some(callback) = &self.error_callback {
                callback(&message);
            }
            self.last_error = Some(message);
        }
        result
    }
}
