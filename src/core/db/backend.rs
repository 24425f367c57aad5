/// Backend Module
///
/// The seam between the statement executor and a concrete database driver.
/// A backend only ships finished statements to the server; all SQL text is
/// assembled by the builder.

use crate::core::db::builder::Statement;
use crate::core::{Result, Row};

/// SQL dialect spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Microsoft SQL Server (T-SQL)
    SqlServer,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Table hint appended to unfiltered SELECTs to read without taking
    /// shared locks
    pub fn lock_hint(&self) -> Option<&'static str> {
        match self {
            Dialect::SqlServer => Some("WITH (NOLOCK)"),
            Dialect::Sqlite => None,
        }
    }

    /// Query returning one `table_name` column of schema-qualified base tables
    pub fn tables_sql(&self) -> &'static str {
        match self {
            Dialect::SqlServer => {
                "SELECT CONCAT(TABLE_SCHEMA, '.', TABLE_NAME) AS table_name \
                 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'"
            }
            Dialect::Sqlite => {
                "SELECT 'main.' || name AS table_name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
        }
    }

    pub fn begin_sql(&self) -> &'static str {
        match self {
            Dialect::SqlServer => "BEGIN TRANSACTION",
            Dialect::Sqlite => "BEGIN",
        }
    }

    pub fn commit_sql(&self) -> &'static str {
        match self {
            Dialect::SqlServer => "COMMIT TRANSACTION",
            Dialect::Sqlite => "COMMIT",
        }
    }

    pub fn rollback_sql(&self) -> &'static str {
        match self {
            Dialect::SqlServer => "ROLLBACK TRANSACTION",
            Dialect::Sqlite => "ROLLBACK",
        }
    }
}

/// A live database session.
///
/// Implementations block the calling thread for every call. `close` must be
/// idempotent; any call after it returns `Error::Closed`.
pub trait Backend {
    /// Dialect used to build statements for this backend
    fn dialect(&self) -> Dialect;

    /// Runs a statement and collects every row of its first result set
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>>;

    /// Runs a statement that returns no rows, yielding the affected-row count
    fn execute(&mut self, statement: &Statement) -> Result<u64>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Releases the session
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}
