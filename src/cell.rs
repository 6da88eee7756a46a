// 🧮 Cell Model - Untyped spreadsheet values + safe coercion
// Rows come from CSV or workbook exports with no header and a fixed column layout

use crate::error::RowError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CELL
// ============================================================================

/// A single spreadsheet value.
///
/// `Empty` is a cell that exists but holds nothing. A column past the end of a
/// row is *absent*, which `Row::get` reports as `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
    /// Spreadsheet error value such as `#REF!` or `#DIV/0!`
    Invalid(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Borrow the string if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Render the value as it reads in the sheet.
    ///
    /// Error cells cannot be rendered; `column` is only used in the error.
    pub fn render(&self, column: usize) -> Result<String, RowError> {
        match self {
            Cell::Text(s) => Ok(s.clone()),
            Cell::Number(n) => Ok(n.to_string()),
            Cell::Empty => Ok(String::new()),
            Cell::Invalid(value) => Err(RowError::InvalidCell {
                column,
                value: value.clone(),
            }),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Empty => Ok(()),
            Cell::Invalid(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

// ============================================================================
// ROW
// ============================================================================

/// An ordered sequence of cells; index 0 is the first sheet column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Row { cells }
    }

    /// Cell at `column`, or `None` when the row is shorter than that
    pub fn get(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Text content at `column` when the cell is a text cell
    pub fn text(&self, column: usize) -> Option<&str> {
        self.get(column).and_then(Cell::as_text)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

impl From<Vec<Cell>> for Row {
    fn from(cells: Vec<Cell>) -> Self {
        Row::new(cells)
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Row::new(iter.into_iter().collect())
    }
}

// ============================================================================
// NUMERIC COERCION
// ============================================================================

/// How the price column is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    /// Text counts only if it is all digits once `.` and `,` are removed.
    /// Such text must then parse as a plain number or the row is dropped, so
    /// `"1,500.00"` is an error while `"$50"` reads as 0.
    #[default]
    Legacy,
    /// Thousands and decimal separators are normalized before parsing.
    Lenient,
}

impl PriceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceMode::Legacy => "legacy",
            PriceMode::Lenient => "lenient",
        }
    }
}

impl std::str::FromStr for PriceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(PriceMode::Legacy),
            "lenient" => Ok(PriceMode::Lenient),
            other => Err(format!(
                "unknown price mode '{}' (expected legacy or lenient)",
                other
            )),
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Coerce a cost cell to a number. Never fails.
///
/// Absent, empty, `-`, error cells and unparseable text all read as 0.
pub fn safe_numeric(cell: Option<&Cell>) -> f64 {
    match cell {
        Some(Cell::Number(n)) => non_negative(*n),
        Some(Cell::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "-" {
                return 0.0;
            }
            trimmed.parse::<f64>().map(non_negative).unwrap_or(0.0)
        }
        Some(Cell::Empty) | Some(Cell::Invalid(_)) | None => 0.0,
    }
}

/// Read the price column according to `mode`.
///
/// Only `Legacy` can fail, on digit-and-separator text that is not a number.
pub fn parse_price(cell: Option<&Cell>, mode: PriceMode) -> Result<f64, RowError> {
    match cell {
        Some(Cell::Number(n)) => Ok(non_negative(*n)),
        Some(Cell::Text(s)) => match mode {
            PriceMode::Legacy => legacy_price(s),
            PriceMode::Lenient => Ok(lenient_price(s)),
        },
        _ => Ok(0.0),
    }
}

fn legacy_price(raw: &str) -> Result<f64, RowError> {
    let digits: String = raw.chars().filter(|c| *c != '.' && *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .map(non_negative)
        .map_err(|_| RowError::InvalidPrice {
            value: raw.to_string(),
        })
}

fn lenient_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let normalized = match (last_dot, last_comma) {
        // Both present: whichever comes last is the decimal separator
        (Some(dot), Some(comma)) if dot > comma => cleaned.replace(',', ""),
        (Some(_), Some(_)) => cleaned.replace('.', "").replace(',', "."),
        (None, Some(comma)) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && decimals <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(_), None) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized.parse::<f64>().map(non_negative).unwrap_or(0.0)
}

// ============================================================================
// TESTS
// ============================================================================
