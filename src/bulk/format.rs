/// bcp non-XML format files.
///
/// ```text
/// 14.0
/// 2
/// 1       SQLCHAR     0       12      "\t"     1     id       ""
/// 2       SQLCHAR     0       100     "\n"     2     name     SQL_Latin1_General_CP1_CI_AS
/// ```
///
/// The first line is the tool version, the second the column count, then
/// one whitespace-separated line per column with the server column name as
/// the seventh field.
use crate::core::{Error, Result};

/// Index of the server column name within a column line
const NAME_FIELD: usize = 6;

/// One column line of a format file
#[derive(Debug, Clone, PartialEq)]
pub struct FormatColumn {
    /// Field order in the data file (first token)
    pub host_order: String,
    /// Field terminator as written in the file, quotes included
    pub terminator: String,
    /// Server column name
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatFile {
    pub version: String,
    pub columns: Vec<FormatColumn>,
}

impl FormatFile {
    /// Parses format file text. Lines after the declared columns are ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines();

        let version = lines
            .next()
            .ok_or_else(|| Error::FormatFile("missing version line".to_string()))?
            .trim()
            .to_string();

        let count_line = lines
            .next()
            .ok_or_else(|| Error::FormatFile("missing column count line".to_string()))?;
        let count: usize = count_line.trim().parse().map_err(|_| {
            Error::FormatFile(format!("invalid column count: {:?}", count_line.trim()))
        })?;

        let mut columns = Vec::with_capacity(count);
        for index in 0..count {
            let line = lines.next().ok_or_else(|| {
                Error::FormatFile(format!("expected {} columns, found {}", count, index))
            })?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() <= NAME_FIELD {
                return Err(Error::FormatFile(format!(
                    "column line {} has {} fields: {:?}",
                    index + 1,
                    tokens.len(),
                    line
                )));
            }
            columns.push(FormatColumn {
                host_order: tokens[0].to_string(),
                terminator: tokens[4].to_string(),
                name: tokens[NAME_FIELD].to_string(),
            });
        }

        Ok(FormatFile { version, columns })
    }

    /// Server column names in data-file order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
