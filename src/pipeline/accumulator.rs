//! Ordered accumulation of extracted rows.
//!
//! [`ResultAccumulator`] keeps two parallel sequences (titles, abstracts)
//! that only ever grow together. Once every batch is processed it is
//! consumed into an immutable [`ResultTable`].

use crate::extract::{ExtractedRow, SENTINEL};
use crate::record::Record;

/// Column headers of the result table.
pub const COLUMNS: [&str; 2] = ["Title", "Abstract"];

/// Append-only builder for the result table.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    titles: Vec<String>,
    abstracts: Vec<String>,
}

impl ResultAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty accumulator with room for `rows` rows.
    #[must_use]
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            titles: Vec::with_capacity(rows),
            abstracts: Vec::with_capacity(rows),
        }
    }

    /// Appends one row.
    pub fn push(&mut self, row: ExtractedRow) {
        self.titles.push(row.title);
        self.abstracts.push(row.abstract_text);
    }

    /// Extracts and appends one row per record, in record order.
    ///
    /// Returns the number of rows appended.
    pub fn append_records(&mut self, records: &[Record]) -> usize {
        for record in records {
            self.push(ExtractedRow::from_record(record));
        }
        records.len()
    }

    /// Appends `count` rows with both fields set to the sentinel.
    pub fn append_sentinels(&mut self, count: usize) {
        self.titles
            .extend(std::iter::repeat_n(SENTINEL.to_string(), count));
        self.abstracts
            .extend(std::iter::repeat_n(SENTINEL.to_string(), count));
    }

    /// Number of rows accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// True when no row has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Consumes the accumulator into the final table.
    #[must_use]
    pub fn finish(self) -> ResultTable {
        debug_assert_eq!(self.titles.len(), self.abstracts.len());
        ResultTable {
            titles: self.titles,
            abstracts: self.abstracts,
        }
    }
}

/// Immutable `{Title, Abstract}` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    titles: Vec<String>,
    abstracts: Vec<String>,
}

impl ResultTable {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// True for a table without rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Title column.
    #[must_use]
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Abstract column.
    #[must_use]
    pub fn abstracts(&self) -> &[String] {
        &self.abstracts
    }

    /// Rows as `(title, abstract)` pairs in order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.titles
            .iter()
            .map(String::as_str)
            .zip(self.abstracts.iter().map(String::as_str))
    }

    /// Number of rows where both fields hold the sentinel.
    #[must_use]
    pub fn sentinel_rows(&self) -> usize {
        self.rows()
            .filter(|(title, abstract_text)| *title == SENTINEL && *abstract_text == SENTINEL)
            .count()
    }
}

impl FromIterator<ExtractedRow> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ExtractedRow>>(iter: I) -> Self {
        let mut accumulator = ResultAccumulator::new();
        for row in iter {
            accumulator.push(row);
        }
        accumulator.finish()
    }
}
