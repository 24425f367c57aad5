/// Error Module
///
/// This module defines the error type shared by the statement builder, the
/// database backends, the bulk loader and the configuration layer.
use thiserror::Error;

/// SQL Server error numbers reported for malformed statements rather than
/// for data or connectivity problems.
#[cfg(feature = "mssql")]
const MSSQL_PROGRAMMING_ERRORS: &[u32] = &[
    102,  // incorrect syntax near
    105,  // unclosed quotation mark
    156,  // incorrect syntax near keyword
    170,  // incorrect syntax (line)
    207,  // invalid column name
    208,  // invalid object name
    209,  // ambiguous column name
    213,  // column name or number of supplied values does not match
    1038, // empty object or column name
    2705, // duplicate column names in a table
    4104, // multi-part identifier could not be bound
    8144, // too many arguments
];

/// Error type for every fallible operation in the crate.
///
/// The variants fall into three groups:
/// - Driver errors (`Sqlite`, `Mssql`, `Programming`) coming back from the server
/// - Local validation errors raised before anything is sent
/// - External process and file errors from the bulk loader
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the SQLite backend
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Errors from the SQL Server driver
    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// Statement-level programming errors detected locally
    #[error("Programming error: {0}")]
    Programming(String),

    /// The connection's transaction is in a state that forbids the operation
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A table or column name that cannot be spliced into SQL text
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// INSERT or UPDATE called without any field
    #[error("Record has no fields")]
    EmptyRecord,

    /// A record field that the target table's format file does not declare
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A value that cannot be written to a tab-delimited data file
    #[error("Delimited file error: {0}")]
    Delimited(String),

    /// A bcp format file that could not be parsed
    #[error("Format file error: {0}")]
    FormatFile(String),

    /// An external process exited unsuccessfully
    #[error("Process {program} failed with return code {}", exit_code(.code))]
    Process { program: String, code: Option<i32> },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The connection has already been closed
    #[error("Connection is closed")]
    Closed,
}

impl Error {
    /// Returns true for errors caused by the statement itself (bad syntax,
    /// unknown tables or columns, parameter mismatches).
    ///
    /// Only these errors roll back the pending transaction; everything else
    /// leaves it unresolved.
    pub fn is_programming(&self) -> bool {
        match self {
            Error::Programming(_) => true,
            Error::Sqlite(err) => is_sqlite_programming(err),
            #[cfg(feature = "mssql")]
            Error::Mssql(tiberius::error::Error::Server(token)) => {
                MSSQL_PROGRAMMING_ERRORS.contains(&token.code())
            }
            _ => false,
        }
    }
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

fn is_sqlite_programming(err: &rusqlite::Error) -> bool {
    match err {
        // SQLITE_ERROR: syntax errors, missing tables and columns
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == rusqlite::ErrorCode::Unknown
        }
        rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::InvalidParameterCount(_, _)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::ExecuteReturnedResults => true,
        _ => false,
    }
}

/// Type alias for Result to use the crate Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Process {
            program: "bcp".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "Process bcp failed with return code 1");

        let err = Error::Process {
            program: "bcp".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("return code none"));

        let err = Error::InvalidIdentifier("a;b".to_string());
        assert!(err.to_string().contains("Invalid identifier"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_sqlite_programming_classification() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();

        let syntax: Error = conn.execute("INSERT INTO", []).unwrap_err().into();
        assert!(syntax.is_programming());

        let missing: Error = conn.execute("DELETE FROM missing", []).unwrap_err().into();
        assert!(missing.is_programming());

        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        let constraint: Error = conn
            .execute("INSERT INTO t (id) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(!constraint.is_programming());

        assert!(!Error::Closed.is_programming());
    }
}
