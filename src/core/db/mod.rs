/// Database Module
///
/// ## Architecture
///
/// The database layer is split into four concerns:
/// - **Statement Building** (`builder.rs`): parameterized SELECT/INSERT/UPDATE/DELETE text
/// - **Backend Seam** (`backend.rs`): the `Backend` trait and SQL dialects
/// - **Drivers** (`mssql.rs`, `sqlite.rs`): SQL Server over TDS and local SQLite
/// - **Connection** (`connection.rs`): the `SqlServer` handle and its commit/rollback wrapper
///
/// ## Error Handling
///
/// All database operations use the crate `Error` type. Driver errors are
/// classified with `Error::is_programming` to decide between rollback and
/// leaving the transaction unresolved.
pub mod backend;
pub mod builder;
pub mod connection;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod sqlite;

pub use backend::{Backend, Dialect};
pub use builder::{Columns, Statement};
pub use connection::{SqlServer, TransactionState};
#[cfg(feature = "mssql")]
pub use mssql::MssqlBackend;
pub use sqlite::SqliteBackend;
