/// Connection Module
///
/// `SqlServer` is the caller-owned connection handle. It builds statements
/// for the CRUD helpers, runs them on its backend and wraps every mutation
/// in its own transaction.

use crate::bulk::{self, BulkCopy};
#[cfg(feature = "mssql")]
use crate::bulk::BcpTool;
#[cfg(feature = "mssql")]
use crate::config::ServerConfig;
use crate::core::db::backend::{Backend, Dialect};
use crate::core::db::builder::{self, Columns, Statement};
use crate::core::db::sqlite::SqliteBackend;
use crate::core::{Condition, Error, Record, Result, Row, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TransactionState {
    /// No active transaction (autocommit mode)
    #[default]
    Autocommit,
    /// Transaction in progress
    Transaction,
    /// A mutation failed with a non-programming error and its transaction
    /// was neither committed nor rolled back
    Failed,
}

/// A connection to one database.
///
/// The handle is exclusively owned by its caller. Dropping it closes the
/// backend, so the session is released on every exit path.
pub struct SqlServer {
    backend: Box<dyn Backend>,
    bulk_copy: Option<Box<dyn BulkCopy>>,
    state: TransactionState,
}

impl SqlServer {
    /// Connects to SQL Server and wires `bcp` for bulk inserts
    #[cfg(feature = "mssql")]
    pub fn connect(config: &ServerConfig) -> Result<Self> {
        let backend = crate::core::db::mssql::MssqlBackend::connect(config)?;
        Ok(SqlServer::with_backend(backend).with_bulk_copy(BcpTool::new(config.clone())))
    }

    /// Connects with plain credentials on the default port
    #[cfg(feature = "mssql")]
    pub fn new(user: &str, password: &str, host: &str, database: &str) -> Result<Self> {
        SqlServer::connect(&ServerConfig::new(user, password, host, database))
    }

    /// Opens a local SQLite database
    pub fn open_sqlite<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(SqlServer::with_backend(SqliteBackend::open(path)?))
    }

    /// Wraps an already open backend
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        SqlServer {
            backend: Box::new(backend),
            bulk_copy: None,
            state: TransactionState::Autocommit,
        }
    }

    /// Sets the tool used by `bulk_insert`
    pub fn with_bulk_copy(mut self, tool: impl BulkCopy + 'static) -> Self {
        self.bulk_copy = Some(Box::new(tool));
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    /// Lists schema-qualified base tables
    pub fn tables(&mut self) -> Result<Vec<String>> {
        let statement = Statement::new(self.dialect().tables_sql());
        let rows = self.backend.query(&statement)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.get_index(0) {
                Some(Value::Text(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Runs raw SQL and returns every row. No transaction handling.
    pub fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.query_with(sql, Vec::new())
    }

    /// Runs raw SQL with values bound to `@P1`, `@P2`, ...
    pub fn query_with(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let statement = Statement::with_params(sql, params);
        debug!("query: {} ({} params)", statement.sql, statement.params.len());
        self.backend.query(&statement)
    }

    /// Selects rows, optionally filtered by equality conditions
    pub fn select(
        &mut self,
        table: &str,
        columns: &Columns,
        condition: Option<&Condition>,
    ) -> Result<Vec<Row>> {
        let statement = builder::select(self.dialect(), table, columns, condition, false)?;
        debug!("select: {} ({} params)", statement.sql, statement.params.len());
        self.backend.query(&statement)
    }

    /// Same as `select` with `SELECT DISTINCT`
    pub fn select_distinct(
        &mut self,
        table: &str,
        columns: &Columns,
        condition: Option<&Condition>,
    ) -> Result<Vec<Row>> {
        let statement = builder::select(self.dialect(), table, columns, condition, true)?;
        debug!("select: {} ({} params)", statement.sql, statement.params.len());
        self.backend.query(&statement)
    }

    /// Inserts one row and commits
    pub fn insert(&mut self, table: &str, record: &Record) -> Result<u64> {
        let statement = builder::insert(table, record)?;
        self.execute(&statement)
    }

    /// Updates matching rows (all rows without a condition) and commits
    pub fn update(
        &mut self,
        table: &str,
        record: &Record,
        condition: Option<&Condition>,
    ) -> Result<u64> {
        let statement = builder::update(table, record, condition)?;
        self.execute(&statement)
    }

    /// Deletes matching rows and commits. Without a condition every row is deleted.
    pub fn delete(&mut self, table: &str, condition: Option<&Condition>) -> Result<u64> {
        let statement = builder::delete(table, condition)?;
        self.execute(&statement)
    }

    /// Loads `records` into `table` with the configured bulk-copy tool
    pub fn bulk_insert(&mut self, table: &str, records: &[Record]) -> Result<()> {
        let tool = self
            .bulk_copy
            .as_deref()
            .ok_or_else(|| Error::Config("no bulk-copy tool configured".to_string()))?;
        bulk::bulk_insert(tool, table, records)
    }

    /// Closes the connection
    pub fn close(mut self) -> Result<()> {
        self.backend.close()
    }

    /// Runs a mutation in its own transaction.
    ///
    /// Commits on success. A programming error rolls back and is returned;
    /// any other error, including a failed BEGIN or COMMIT, is returned with
    /// the connection marked `Failed`. A failed rollback is logged and also
    /// leaves the connection `Failed`.
    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        if self.state == TransactionState::Failed {
            return Err(Error::Transaction(
                "a previous statement left the transaction unresolved; reconnect".to_string(),
            ));
        }
        debug!("execute: {}", statement.sql);

        if let Err(err) = self.backend.begin() {
            self.state = TransactionState::Failed;
            return Err(err);
        }
        self.state = TransactionState::Transaction;

        match self.backend.execute(statement) {
            Ok(affected) => {
                if let Err(err) = self.backend.commit() {
                    self.state = TransactionState::Failed;
                    return Err(err);
                }
                self.state = TransactionState::Autocommit;
                Ok(affected)
            }
            Err(err) if err.is_programming() => {
                warn!("Rolling back after programming error: {}", err);
                match self.backend.rollback() {
                    Ok(()) => self.state = TransactionState::Autocommit,
                    Err(rollback_err) => {
                        warn!("Rollback failed: {}", rollback_err);
                        self.state = TransactionState::Failed;
                    }
                }
                Err(err)
            }
            Err(err) => {
                self.state = TransactionState::Failed;
                Err(err)
            }
        }
    }
}

impl Drop for SqlServer {
    fn drop(&mut self) {
        if self.backend.is_open() {
            if let Err(e) = self.backend.close() {
                warn!("Failed to close connection: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for SqlServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServer")
            .field("dialect", &self.backend.dialect())
            .field("open", &self.backend.is_open())
            .field("state", &self.state)
            .finish()
    }
}
