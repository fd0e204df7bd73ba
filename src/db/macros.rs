//! Backend dispatch macros.
//!
//! The macro generates the `match` over `DbConnection` variants so that each
//! backend arm stays on one readable line. Arms may carry a `#[cfg]` attribute
//! for backends that are behind a cargo feature.

/// Macro for generating backend dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     SQLite(c) => sqlite::run(c).await,
///     MySql(c) => mysql::run(c).await,
///     #[cfg(feature = "oledb")]
///     OleDb(c) => c.run(),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($(#[$meta:meta])* $variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $(#[$meta])*
                $crate::db::connection::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
