// ⚠️ Typed errors - the failures callers match on
// Everything else travels as anyhow::Error with context

use thiserror::Error;

/// Why a single catalog row was dropped during extraction.
///
/// Row errors never abort a pass: the extractor records them and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    /// The spreadsheet stored an error value (`#REF!`, `#N/A`, ...) in a text column
    #[error("column {column} holds a spreadsheet error: {value}")]
    InvalidCell { column: usize, value: String },

    /// Price text that looks numeric once separators are removed but is not a number
    #[error("price '{value}' is not a plain number")]
    InvalidPrice { value: String },
}

/// Failures of the HTML template sink.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template does not contain the placeholder `{0}`")]
    MissingPlaceholder(String),

    #[error("failed to serialize plans: {0}")]
    Serialize(#[from] serde_json::Error),
}
