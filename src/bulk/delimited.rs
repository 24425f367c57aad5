/// Tab-delimited data files for bcp character mode.
///
/// Files have no header, one record per `\n`-terminated line, and fields in
/// the order of the table's format file. bcp does not understand quoting, so
/// values containing the delimiter or a line break are rejected instead of
/// escaped.
use crate::core::{Error, Record, Result, Value};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

pub const FIELD_DELIMITER: char = '\t';
pub const LINE_TERMINATOR: char = '\n';

fn field(column: &str, value: &Value) -> Result<String> {
    let text = match value {
        Value::Null => return Ok(String::new()),
        other => other.to_string(),
    };
    if text.contains(&[FIELD_DELIMITER, LINE_TERMINATOR, '\r'][..]) {
        return Err(Error::Delimited(format!(
            "value for column {} contains a tab or line break",
            column
        )));
    }
    Ok(text)
}

/// Writes `records` with fields ordered by `columns`.
///
/// Missing fields and nulls are written empty. A field whose column is not
/// in `columns` fails with `Error::UnknownColumn` before anything of that
/// record is written. Returns the number of records written.
pub fn write_records<W: Write>(writer: &mut W, columns: &[String], records: &[Record]) -> Result<usize> {
    let mut line = String::new();
    for record in records {
        if let Some(extra) = record.columns().find(|c| !columns.iter().any(|k| k.as_str() == *c)) {
            return Err(Error::UnknownColumn(extra.to_string()));
        }

        line.clear();
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            if let Some(value) = record.get(column) {
                line.push_str(&field(column, value)?);
            }
        }
        line.push(LINE_TERMINATOR);
        writer.write_all(line.as_bytes())?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Reads a file produced by `write_records` back as text fields keyed by
/// column name. Empty lines are skipped.
pub fn read_records<R: BufRead>(reader: R, columns: &[String]) -> Result<Vec<BTreeMap<String, String>>> {
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() && columns.len() > 1 {
            continue;
        }
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != columns.len() {
            return Err(Error::Delimited(format!(
                "line {} has {} fields, expected {}",
                number + 1,
                fields.len(),
                columns.len()
            )));
        }
        records.push(
            columns
                .iter()
                .cloned()
                .zip(fields.into_iter().map(String::from))
                .collect(),
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_write_in_column_order() {
        let records = vec![
            Record::new().set("name", "Alice").set("id", 1),
            Record::new().set("id", 2).set("name", Value::Null),
        ];
        let mut out = Vec::new();
        let written = write_records(&mut out, &columns(&["id", "name"]), &records).unwrap();

        assert_eq!(written, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "1\tAlice\n2\t\n");
    }

    #[test]
    fn test_missing_field_is_empty() {
        let records = vec![Record::new().set("id", 1)];
        let mut out = Vec::new();
        write_records(&mut out, &columns(&["id", "name", "city"]), &records).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\t\t\n");
    }

    #[test]
    fn test_extra_field_is_an_error() {
        let records = vec![Record::new().set("id", 1).set("nickname", "al")];
        let mut out = Vec::new();
        let err = write_records(&mut out, &columns(&["id"]), &records).unwrap_err();
        match err {
            Error::UnknownColumn(column) => assert_eq!(column, "nickname"),
            other => panic!("Expected UnknownColumn, got {:?}", other),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_embedded_tab_is_an_error() {
        let records = vec![Record::new().set("note", "a\tb")];
        let mut out = Vec::new();
        assert!(matches!(
            write_records(&mut out, &columns(&["note"]), &records),
            Err(Error::Delimited(_))
        ));
    }

    #[test]
    fn test_booleans_and_blobs() {
        let records = vec![Record::new().set("flag", true).set("data", vec![0xca_u8, 0xfe])];
        let mut out = Vec::new();
        write_records(&mut out, &columns(&["flag", "data"]), &records).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\tCAFE\n");
    }

    #[test]
    fn test_read_back() {
        let cols = columns(&["id", "name"]);
        let records = read_records("1\tAlice\n2\t\n".as_bytes(), &cols).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Alice");
        assert_eq!(records[1]["name"], "");
    }

    #[test]
    fn test_read_wrong_field_count() {
        let cols = columns(&["id", "name"]);
        assert!(read_records("1\tAlice\tx\n".as_bytes(), &cols).is_err());
    }
}
