//! CSV export of the result table.
//!
//! The output has a `Title,Abstract` header followed by one line per row.
//! Quoting follows the `csv` crate defaults (fields containing the
//! delimiter, quotes or line breaks are quoted). Output is deterministic for
//! identical tables.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::pipeline::{COLUMNS, ResultTable};

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "pubmed_articles.csv";

/// Errors produced while writing the result table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output file could not be created.
    #[error("cannot create output file {path}: {source}")]
    Create {
        /// Requested output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A row could not be encoded or written.
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Buffered output could not be flushed.
    #[error("failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Abstract")]
    abstract_text: &'a str,
}

/// Writes `table` as CSV to the file at `path`, replacing any existing file.
///
/// The parent directory must already exist.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or written.
#[instrument(skip(table), fields(rows = table.len(), path = %path.display()))]
pub fn write_table(table: &ResultTable, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_table_to(table, file)?;
    debug!("CSV written");
    Ok(())
}

/// Writes `table` as CSV to any writer.
///
/// # Errors
///
/// Returns [`ExportError`] if encoding or writing fails.
pub fn write_table_to<W: Write>(table: &ResultTable, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(COLUMNS)?;
    for (title, abstract_text) in table.rows() {
        wtr.serialize(CsvRow {
            title,
            abstract_text,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
