//! Record field extraction with per-field sentinel fallback.
//!
//! Each target field is extracted independently from a [`Record`]. When a
//! field cannot be extracted, the failure is classified as a [`FieldError`]
//! and replaced by [`SENTINEL`] for that field only; the other field is
//! unaffected. Classified failures never leave this module.
//!
//! | Field | Path |
//! |-------|------|
//! | Title | `MedlineCitation/Article/ArticleTitle` |
//! | Abstract | `MedlineCitation/Article/Abstract/AbstractText[0]` |

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::record::{Element, Record};

/// Placeholder written when a field cannot be extracted.
pub const SENTINEL: &str = "NA";

const TITLE_PATH: &[&str] = &["MedlineCitation", "Article", "ArticleTitle"];
const ABSTRACT_PATH: &[&str] = &["MedlineCitation", "Article", "Abstract"];
const ABSTRACT_SEGMENT: &str = "AbstractText";

/// Why a single field could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// A step of the field path is absent.
    #[error("missing <{segment}>")]
    MissingPath {
        /// The first path step that was not found.
        segment: &'static str,
    },

    /// The container exists but holds no segment to read.
    #[error("<{container}> holds no segments")]
    EmptyContainer {
        /// The container element name.
        container: &'static str,
    },

    /// The target element exists but carries no text.
    #[error("<{element}> has no text content")]
    WrongShape {
        /// The target element name.
        element: &'static str,
    },
}

/// The two exported fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Article title.
    Title,
    /// First abstract segment.
    Abstract,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::Abstract => f.write_str("abstract"),
        }
    }
}

/// One output row: title and abstract, each either real text or [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRow {
    /// Title value or sentinel.
    pub title: String,
    /// Abstract value or sentinel.
    pub abstract_text: String,
}

impl ExtractedRow {
    /// Creates a row from explicit values.
    #[must_use]
    pub fn new(title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            abstract_text: abstract_text.into(),
        }
    }

    /// A row with both fields set to the sentinel.
    #[must_use]
    pub fn sentinel() -> Self {
        Self::new(SENTINEL, SENTINEL)
    }

    /// Extracts both fields from a record, substituting the sentinel per field.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            title: or_sentinel(record, Field::Title, extract_title(record)),
            abstract_text: or_sentinel(record, Field::Abstract, extract_abstract(record)),
        }
    }

    /// True when both fields hold the sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.title == SENTINEL && self.abstract_text == SENTINEL
    }
}

/// Extracts the article title.
///
/// # Errors
///
/// Returns a [`FieldError`] describing why the title is unavailable.
pub fn extract_title(record: &Record) -> Result<String, FieldError> {
    let title = navigate(record.root(), TITLE_PATH)?;
    non_empty_text(title, "ArticleTitle")
}

/// Extracts the first abstract segment.
///
/// # Errors
///
/// Returns a [`FieldError`] describing why the abstract is unavailable.
pub fn extract_abstract(record: &Record) -> Result<String, FieldError> {
    let container = navigate(record.root(), ABSTRACT_PATH)?;
    let first = container
        .child(ABSTRACT_SEGMENT)
        .ok_or(FieldError::EmptyContainer {
            container: "Abstract",
        })?;
    non_empty_text(first, ABSTRACT_SEGMENT)
}

fn navigate<'a>(root: &'a Element, path: &[&'static str]) -> Result<&'a Element, FieldError> {
    path.iter().try_fold(root, |element, &segment| {
        element
            .child(segment)
            .ok_or(FieldError::MissingPath { segment })
    })
}

fn non_empty_text(element: &Element, name: &'static str) -> Result<String, FieldError> {
    let text = element.text_content();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FieldError::WrongShape { element: name });
    }
    Ok(trimmed.to_string())
}

fn or_sentinel(record: &Record, field: Field, result: Result<String, FieldError>) -> String {
    result.unwrap_or_else(|error| {
        debug!(record = %record, %field, %error, "field unavailable, using sentinel");
        SENTINEL.to_string()
    })
}
