//! Data models for xdatabase.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod table;

// Re-export commonly used types
pub use connection::{
    ClientConfig, ConfigError, DEFAULT_TIMEOUT_MS, DatabaseType, TransactionState,
    masked_connection_string,
};
pub use query::{Param, Statement, Value};
pub use table::{Column, ColumnValues, FromCell, Row, Table};
