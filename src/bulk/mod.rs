/// Bulk Insert Module
///
/// Loads many records at once through an external bulk-copy tool:
///
/// 1. the tool writes a format file describing the target table
/// 2. the format file gives the column order of the data file
/// 3. the records are written as a tab-delimited data file
/// 4. the tool loads the data file, stopping at the first bad row
///
/// Both files live in a temporary directory that is removed when the call
/// returns, whether it succeeded or not.

pub mod bcp;
pub mod delimited;
pub mod format;

pub use bcp::BcpTool;
pub use format::{FormatColumn, FormatFile};

use crate::core::db::builder::identifier;
use crate::core::{Record, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Rows the tool may reject before it aborts the load
pub const MAX_ERRORS: u32 = 1;

/// The two operations of a bulk-copy utility.
///
/// `BcpTool` shells out to `bcp`; other implementations can use a native
/// bulk-copy protocol instead.
pub trait BulkCopy {
    /// Writes a character-mode format file for `table` to `format_file`
    fn generate_format_file(&self, table: &str, format_file: &Path, delimiter: char) -> Result<()>;

    /// Loads `data_file` into `table` as described by `format_file`
    fn load(&self, table: &str, data_file: &Path, format_file: &Path, max_errors: u32) -> Result<()>;
}

/// Bulk-inserts `records` into `table` using `tool`
pub fn bulk_insert(tool: &dyn BulkCopy, table: &str, records: &[Record]) -> Result<()> {
    let table = identifier(table)?;
    let workdir = tempfile::Builder::new().prefix("bulk-insert-").tempdir()?;
    let format_path = workdir.path().join("table.fmt");
    let data_path = workdir.path().join("data.tsv");

    tool.generate_format_file(table, &format_path, delimited::FIELD_DELIMITER)?;
    let format = FormatFile::parse(&fs::read_to_string(&format_path)?)?;
    let columns = format.column_names();
    info!("{} has {} columns in its format file", table, columns.len());

    let mut writer = BufWriter::new(File::create(&data_path)?);
    let written = delimited::write_records(&mut writer, &columns, records)?;
    drop(writer);

    info!("Loading {} records into {}", written, table);
    tool.load(table, &data_path, &format_path, MAX_ERRORS)?;

    workdir.close()?;
    Ok(())
}
