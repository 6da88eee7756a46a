// 📂 Sheet Sources - CSV and workbook exports → rows of cells
// The column layout is fixed, so readers keep every row and column in place

use crate::cell::{Cell, Row};
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "CSV",
            SourceFormat::Workbook => "Workbook",
        }
    }
}

/// Reads a sheet export into rows without interpreting a header.
pub trait SheetReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>>;

    fn format(&self) -> SourceFormat;
}

/// Detect the source format from the file extension
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" | "txt" => Ok(SourceFormat::Csv),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
        _ => Err(anyhow!(
            "Unsupported input format: {} (expected .csv, .xlsx, .xls or .ods)",
            path.display()
        )),
    }
}

/// Get the reader for a format; `sheet` only matters for workbooks
pub fn get_reader(format: SourceFormat, sheet: Option<&str>) -> Box<dyn SheetReader> {
    match format {
        SourceFormat::Csv => Box::new(CsvSheetReader),
        SourceFormat::Workbook => Box::new(WorkbookReader::new(sheet.map(str::to_string))),
    }
}

/// Detect, pick a reader and read all rows
pub fn load_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Row>> {
    let reader = get_reader(detect_format(path)?, sheet);
    let rows = reader.read_rows(path)?;
    debug!(
        "read {} rows from {} ({})",
        rows.len(),
        path.display(),
        reader.format().name()
    );
    Ok(rows)
}

/// SHA-256 of the raw file, recorded with each database import
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// CSV
// ============================================================================

pub struct CsvSheetReader;

impl SheetReader for CsvSheetReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let mut rows = Vec::new();
        for (line_num, result) in reader.byte_records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to parse CSV line {} in {}", line_num + 1, path.display())
            })?;

            let row: Row = record
                .iter()
                .map(|field| {
                    let value = String::from_utf8_lossy(field);
                    if value.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(value.into_owned())
                    }
                })
                .collect();
            rows.push(row);
        }

        Ok(rows)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

// ============================================================================
// WORKBOOK (xlsx / xls / ods)
// ============================================================================

pub struct WorkbookReader {
    sheet: Option<String>,
}

impl WorkbookReader {
    pub fn new(sheet: Option<String>) -> Self {
        WorkbookReader { sheet }
    }
}

impl SheetReader for WorkbookReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .context("Workbook has no sheets")?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

        // The range starts at the first used cell; pad so offsets match the sheet
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Row> = (0..start_row).map(|_| Row::default()).collect();

        for data_row in range.rows() {
            let cells = std::iter::repeat(Cell::Empty)
                .take(start_col as usize)
                .chain(data_row.iter().map(convert_cell));
            rows.push(cells.collect());
        }

        Ok(rows)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Workbook
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Invalid(e.to_string()),
        Data::Empty => Cell::Empty,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("planes.csv")).unwrap(), SourceFormat::Csv);
        assert_eq!(
            detect_format(Path::new("LISTADO PLANES.XLSX")).unwrap(),
            SourceFormat::Workbook
        );
        assert_eq!(detect_format(Path::new("a.ods")).unwrap(), SourceFormat::Workbook);
        assert!(detect_format(Path::new("planes.pdf")).is_err());
        assert!(detect_format(Path::new("planes")).is_err());
    }

    #[test]
    fn test_reader_matches_format() {
        for format in [SourceFormat::Csv, SourceFormat::Workbook] {
            assert_eq!(get_reader(format, Some("Table 1")).format(), format);
        }
    }

    #[test]
    fn test_csv_keeps_positions_and_blanks() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, ",Código,,Descripción").unwrap();
        writeln!(file, ",GPON").unwrap();
        writeln!(file, ",G01,,2PLAY 100M,,60").unwrap();
        file.flush().unwrap();

        let rows = load_rows(file.path(), None).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get(0), Some(&Cell::Empty));
        assert_eq!(rows[0].text(1), Some("Código"));
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[1].get(3), None);
        assert_eq!(rows[2].text(5), Some("60"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "BAN,SUB\n1,2\n").unwrap();
        file.flush().unwrap();

        let a = fingerprint(file.path()).unwrap();
        let b = fingerprint(file.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_convert_workbook_cells() {
        assert_eq!(convert_cell(&Data::Int(1500)), Cell::Number(1500.0));
        assert_eq!(convert_cell(&Data::Float(49.5)), Cell::Number(49.5));
        assert_eq!(convert_cell(&Data::String("GPON".into())), Cell::text("GPON"));
        assert_eq!(convert_cell(&Data::Empty), Cell::Empty);
        assert_eq!(convert_cell(&Data::Bool(true)), Cell::text("true"));
        assert!(matches!(
            convert_cell(&Data::Error(calamine::CellErrorType::Ref)),
            Cell::Invalid(_)
        ));
    }

    #[test]
    fn test_missing_workbook_fails() {
        let err = load_rows(Path::new("/nonexistent/planes.xlsx"), Some("Table 1"));
        assert!(err.is_err());
    }
}
