//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Backend connections and transaction statements
//! - Query execution
//! - Named parameter resolution and binding
//! - Type mappings
//! - Backend dispatch macros for reducing code duplication

pub mod connection;
pub mod executor;
#[macro_use]
pub mod macros;
#[cfg(feature = "oledb")]
pub mod oledb;
pub mod params;
pub mod types;

pub use connection::DbConnection;
pub use executor::QueryExecutor;
