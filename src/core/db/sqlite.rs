/// SQLite Backend Module
///
/// A `Backend` over a local SQLite database. Used for local work and as the
/// in-process database of the test-suite.

use crate::core::db::backend::{Backend, Dialect};
use crate::core::db::builder::Statement;
use crate::core::{Error, Result, Row, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use tracing::debug;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            Value::Boolean(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
        })
    }
}

fn from_value_ref(value: ValueRef) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// SQLite session
#[derive(Debug)]
pub struct SqliteBackend {
    connection: Option<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(SqliteBackend {
            connection: Some(connection),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(SqliteBackend {
            connection: Some(connection),
        })
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(Error::Closed)
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&statement.sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                fields.push((name.clone(), from_value_ref(row.get_ref(i)?)));
            }
            result.push(Row::new(fields));
        }
        Ok(result)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let conn = self.connection()?;
        let affected = conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        Ok(affected as u64)
    }

    fn begin(&mut self) -> Result<()> {
        self.connection()?.execute_batch(Dialect::Sqlite.begin_sql())?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.connection()?.execute_batch(Dialect::Sqlite.commit_sql())?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.connection()?.execute_batch(Dialect::Sqlite.rollback_sql())?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            debug!("Closing SQLite connection");
            connection.close().map_err(|(_, e)| Error::Sqlite(e))?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }
}
