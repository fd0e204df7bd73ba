//! Error types for xdatabase.
//!
//! Every fallible operation returns [`DbError`]. Driver failures carry a suggestion to help the caller recover, while the three
//! cell-selection kinds (`CellType`, `CellShape`, `EmptyResult`) describe why a
//! single-value query did not produce exactly one usable value.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "1146" for MySQL unknown table, "1" for SQLite generic error
        code: Option<String>,
        suggestion: String,
    },

    #[error("Connection string is not set or was rejected")]
    NotConfigured,

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("A transaction is already active")]
    TransactionActive,

    #[error("Cell type mismatch: expected {expected}, cell holds {actual}")]
    CellType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Expected a 1x1 result but the query returned {rows}x{columns}")]
    CellShape { rows: usize, columns: usize },

    #[error("Expected a 1x1 result but the query returned an empty result")]
    EmptyResult,

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Backend {backend} is not available: {reason}")]
    UnsupportedBackend { backend: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "image")]
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Connection-level failure: the database could not be reached or opened.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Statement-level failure reported by the driver.
    pub fn database(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// An operation that did not finish within the client timeout.
    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    pub fn unsupported_backend(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedBackend {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// A failure that indicates a bug or a driver invariant being broken.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Recovery hint shown next to the message by the CLI.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::NotConfigured => {
                Some("Set a connection string that can be opened before running queries")
            }
            Self::NoActiveTransaction => Some("Call begin_transaction first"),
            _ => None,
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Check if this error is one of the single-cell selection failures.
    pub fn is_cell_error(&self) -> bool {
        matches!(
            self,
            Self::CellType { .. } | Self::CellShape { .. } | Self::EmptyResult
        )
    }
}

/// Map sqlx failures onto connection, statement and internal errors.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity, file permissions and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => DbError::database(
                format!("Column not found: {}", col),
                None,
                "Check the column names in the query",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

#[cfg(feature = "oledb")]
impl From<odbc_api::Error> for DbError {
    fn from(err: odbc_api::Error) -> Self {
        DbError::database(
            err.to_string(),
            None,
            "Check the ODBC driver installation and the SQL statement",
        )
    }
}

/// Result of a client operation.
pub type DbResult<T> = Result<T, DbError>;
