/// Statement Builder Module
///
/// Turns table names, column lists, records and equality conditions into
/// parameterized statements. Values never appear in the SQL text: each one is
/// bound to an `@P<n>` placeholder, numbered from 1 in order of appearance.
/// Identifiers cannot be bound, so they are validated instead.

use crate::core::db::backend::Dialect;
use crate::core::{Condition, Error, Record, Result, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Up to four dot-separated parts, each a plain or `[bracketed]` name
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\[[^\[\]]+\]|[A-Za-z_#][A-Za-z0-9_@#$]*)(?:\.(?:\[[^\[\]]+\]|[A-Za-z_#][A-Za-z0-9_@#$]*)){0,3}$",
    )
    .expect("identifier pattern is valid")
});

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@P(\d+)").expect("placeholder pattern is valid"));

/// SQL text plus the values bound to its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// A statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }

    /// Renders the statement with every placeholder replaced by its value as
    /// a SQL literal. Meant for diagnostics, never for execution.
    pub fn interpolated(&self) -> String {
        PLACEHOLDER
            .replace_all(&self.sql, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| self.params.get(i))
                    .map_or_else(|| caps[0].to_string(), Value::to_sql_literal)
            })
            .into_owned()
    }
}

/// Column selection for SELECT statements
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Columns {
    /// `*`
    #[default]
    All,
    /// Explicit column names, in output order
    List(Vec<String>),
}

impl Columns {
    fn render(&self) -> Result<String> {
        match self {
            Columns::All => Ok("*".to_string()),
            Columns::List(columns) if columns.is_empty() => {
                Err(Error::Programming("empty column list".to_string()))
            }
            Columns::List(columns) => Ok(columns
                .iter()
                .map(|c| identifier(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ")),
        }
    }
}

impl From<&str> for Columns {
    fn from(column: &str) -> Self {
        if column == "*" {
            Columns::All
        } else {
            Columns::List(vec![column.to_string()])
        }
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Columns {
    fn from(columns: [S; N]) -> Self {
        Columns::List(columns.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for Columns {
    fn from(columns: Vec<String>) -> Self {
        Columns::List(columns)
    }
}

impl From<Vec<&str>> for Columns {
    fn from(columns: Vec<&str>) -> Self {
        Columns::List(columns.into_iter().map(String::from).collect())
    }
}

/// Checks that `name` can be spliced into SQL text as a table or column name
pub fn identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

fn bind(params: &mut Vec<Value>, value: &Value) -> String {
    params.push(value.clone());
    format!("@P{}", params.len())
}

/// Builds ` WHERE a = @P1 AND b IS NULL`, or nothing for an absent/empty condition
fn where_clause(condition: Option<&Condition>, params: &mut Vec<Value>) -> Result<String> {
    let condition = match condition {
        Some(condition) if !condition.is_empty() => condition,
        _ => return Ok(String::new()),
    };

    let mut terms = Vec::with_capacity(condition.len());
    for (column, value) in condition.iter() {
        let column = identifier(column)?;
        if value.is_null() {
            terms.push(format!("{} IS NULL", column));
        } else {
            terms.push(format!("{} = {}", column, bind(params, value)));
        }
    }
    Ok(format!(" WHERE {}", terms.join(" AND ")))
}

/// Builds `SELECT [DISTINCT] <columns> FROM <table> [hint] [WHERE ...]`.
///
/// The dialect's lock hint is added only when there is no condition.
pub fn select(
    dialect: Dialect,
    table: &str,
    columns: &Columns,
    condition: Option<&Condition>,
    distinct: bool,
) -> Result<Statement> {
    let table = identifier(table)?;
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params)?;

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        if distinct { "DISTINCT " } else { "" },
        columns.render()?,
        table
    );
    if filter.is_empty() {
        if let Some(hint) = dialect.lock_hint() {
            sql.push(' ');
            sql.push_str(hint);
        }
    }
    sql.push_str(&filter);

    Ok(Statement::with_params(sql, params))
}

/// Builds a single-row INSERT. Null fields are written as the `NULL` keyword.
pub fn insert(table: &str, record: &Record) -> Result<Statement> {
    let table = identifier(table)?;
    if record.is_empty() {
        return Err(Error::EmptyRecord);
    }

    let mut params = Vec::new();
    let mut columns = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        columns.push(identifier(column)?);
        if value.is_null() {
            values.push("NULL".to_string());
        } else {
            values.push(bind(&mut params, value));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        values.join(", ")
    );
    Ok(Statement::with_params(sql, params))
}

/// Builds `UPDATE <table> SET ... [WHERE ...]`
pub fn update(table: &str, record: &Record, condition: Option<&Condition>) -> Result<Statement> {
    let table = identifier(table)?;
    if record.is_empty() {
        return Err(Error::EmptyRecord);
    }

    let mut params = Vec::new();
    let mut assignments = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        let column = identifier(column)?;
        if value.is_null() {
            assignments.push(format!("{} = NULL", column));
        } else {
            assignments.push(format!("{} = {}", column, bind(&mut params, value)));
        }
    }
    let filter = where_clause(condition, &mut params)?;

    let sql = format!("UPDATE {} SET {}{}", table, assignments.join(", "), filter);
    Ok(Statement::with_params(sql, params))
}

/// Builds `DELETE FROM <table> [WHERE ...]`. Without a condition every row goes.
pub fn delete(table: &str, condition: Option<&Condition>) -> Result<Statement> {
    let table = identifier(table)?;
    let mut params = Vec::new();
    let filter = where_clause(condition, &mut params)?;

    Ok(Statement::with_params(
        format!("DELETE FROM {}{}", table, filter),
        params,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_select_without_condition_adds_lock_hint() {
        let stmt = select(Dialect::SqlServer, "dbo.users", &Columns::All, None, false).unwrap();
        assert_snapshot!(stmt.sql.as_str(), @"SELECT * FROM dbo.users WITH (NOLOCK)");
        assert!(stmt.params.is_empty());

        let stmt = select(Dialect::Sqlite, "users", &Columns::All, None, false).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users");
    }

    #[test]
    fn test_select_with_condition() {
        let condition = Condition::new().eq("name", "Alice").eq("age", 30);
        let stmt = select(
            Dialect::SqlServer,
            "users",
            &Columns::from(["id", "name"]),
            Some(&condition),
            false,
        )
        .unwrap();

        assert_snapshot!(stmt.sql.as_str(), @"SELECT id, name FROM users WHERE age = @P1 AND name = @P2");
        assert_eq!(stmt.params, vec![Value::Integer(30), Value::from("Alice")]);
        assert_eq!(
            stmt.interpolated(),
            "SELECT id, name FROM users WHERE age = '30' AND name = 'Alice'"
        );
    }

    #[test]
    fn test_select_null_condition_uses_is_null() {
        let condition = Condition::new().eq("deleted_at", Value::Null);
        let stmt = select(Dialect::SqlServer, "users", &Columns::All, Some(&condition), false).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE deleted_at IS NULL");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_distinct_keeps_distinct_and_hint() {
        let stmt = select(Dialect::SqlServer, "users", &Columns::from("city"), None, true).unwrap();
        assert_eq!(stmt.sql, "SELECT DISTINCT city FROM users WITH (NOLOCK)");

        let condition = Condition::new().eq("country", "BR");
        let stmt = select(
            Dialect::SqlServer,
            "users",
            &Columns::from("city"),
            Some(&condition),
            true,
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT DISTINCT city FROM users WHERE country = @P1");
    }

    #[test]
    fn test_empty_condition_is_treated_as_absent() {
        let stmt = select(
            Dialect::SqlServer,
            "users",
            &Columns::All,
            Some(&Condition::new()),
            false,
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM users WITH (NOLOCK)");
    }

    #[test]
    fn test_insert_null_and_value() {
        let record = Record::new().set("a", Value::Null).set("b", 1);
        let stmt = insert("t", &record).unwrap();

        assert_snapshot!(stmt.sql.as_str(), @"INSERT INTO t (a, b) VALUES (NULL, @P1)");
        assert_eq!(stmt.params, vec![Value::Integer(1)]);
        assert_eq!(stmt.interpolated(), "INSERT INTO t (a, b) VALUES (NULL, '1')");
    }

    #[test]
    fn test_insert_empty_record() {
        assert!(matches!(insert("t", &Record::new()), Err(Error::EmptyRecord)));
    }

    #[test]
    fn test_update_spacing_and_null() {
        let record = Record::new().set("a", Value::Null).set("b", "x");
        let condition = Condition::new().eq("id", 5);
        let stmt = update("t", &record, Some(&condition)).unwrap();

        assert_snapshot!(stmt.sql.as_str(), @"UPDATE t SET a = NULL, b = @P1 WHERE id = @P2");
        assert_eq!(stmt.interpolated(), "UPDATE t SET a = NULL, b = 'x' WHERE id = '5'");

        let stmt = update("t", &record, None).unwrap();
        assert_eq!(stmt.sql, "UPDATE t SET a = NULL, b = @P1");
    }

    #[test]
    fn test_delete_without_condition_has_no_filter() {
        let stmt = delete("dbo.audit", None).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM dbo.audit");
        assert!(!stmt.sql.contains("WHERE"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_delete_with_condition() {
        let condition = Condition::new().eq("id", 9);
        let stmt = delete("audit", Some(&condition)).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM audit WHERE id = @P1");
        assert_eq!(stmt.params, vec![Value::Integer(9)]);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(identifier("users").is_ok());
        assert!(identifier("dbo.users").is_ok());
        assert!(identifier("[my db].[dbo].[order details]").is_ok());
        assert!(identifier("#staging").is_ok());

        assert!(identifier("").is_err());
        assert!(identifier("users; DROP TABLE users").is_err());
        assert!(identifier("name'--").is_err());
        assert!(identifier("a.b.c.d.e").is_err());
        assert!(identifier("@P1").is_err());
    }

    #[test]
    fn test_injection_attempt_in_value_stays_bound() {
        let condition = Condition::new().eq("name", "x' OR '1'='1");
        let stmt = delete("users", Some(&condition)).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM users WHERE name = @P1");
        assert_eq!(
            stmt.interpolated(),
            "DELETE FROM users WHERE name = 'x'' OR ''1''=''1'"
        );
    }

    #[test]
    fn test_injection_attempt_in_key_is_rejected() {
        let condition = Condition::new().eq("1=1 OR name", "x");
        assert!(matches!(
            delete("users", Some(&condition)),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_interpolation_handles_many_placeholders() {
        let params: Vec<Value> = (1..=11).map(Value::Integer).collect();
        let sql = (1..=11).map(|i| format!("@P{}", i)).collect::<Vec<_>>().join(",");
        let stmt = Statement::with_params(sql, params);
        assert!(stmt.interpolated().ends_with("'10','11'"));
    }

    #[test]
    fn test_empty_column_list() {
        let columns = Columns::List(Vec::new());
        assert!(select(Dialect::Sqlite, "t", &columns, None, false).is_err());
    }
}
