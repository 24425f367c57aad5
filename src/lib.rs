// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod bulk;
pub mod config;
pub mod session;

pub use crate::bulk::{BcpTool, BulkCopy};
pub use crate::config::{Config, ServerConfig};
pub use crate::core::db::{
    Backend, Columns, Dialect, SqlServer, SqliteBackend, Statement, TransactionState,
};
pub use crate::core::{Condition, Error, Record, Result, Row, Value};
#[cfg(feature = "mssql")]
pub use crate::session::with_session;
pub use crate::session::with_session_using;
