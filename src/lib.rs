//! xdatabase Library
//!
//! A small client over SQLite, MySQL and MS Access (OleDb via ODBC) that opens
//! a connection, runs parameterized queries into materialized tables, runs
//! non-query statements and simple transactions, and moves binary blobs in and
//! out of the database.
//!
//! ```no_run
//! use xdatabase::{DatabaseType, DbClient, Param};
//!
//! # async fn demo() -> xdatabase::DbResult<()> {
//! let mut client = DbClient::new(DatabaseType::SQLite);
//! client.set_connection_string("sqlite:app.db").await?;
//! let count: i64 = client
//!     .select_cell("SELECT COUNT(*) FROM users WHERE age > @age", &[Param::named("@age", 30)])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod models;

pub use client::DbClient;
pub use config::Config;
pub use error::{DbError, DbResult};
pub use models::{
    Column, ColumnValues, DatabaseType, FromCell, Param, Row, Statement, Table, Value,
};
