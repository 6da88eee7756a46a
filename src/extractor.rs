// 📋 Plan Extractor - One forward pass over a catalog sheet
// Tags every plan row with the technology section it sits in and a category

use crate::cell::{parse_price, safe_numeric, PriceMode, Row};
use crate::error::RowError;
use crate::rules::CategoryTable;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COLUMN LAYOUT
// ============================================================================

/// Fixed column offsets of the catalog export (0-based).
pub mod columns {
    pub const MARKER: usize = 1;
    pub const DESCRIPTION: usize = 3;
    pub const PRICE: usize = 5;
    pub const ALFA_CODE: usize = 7;
    pub const INST_0M: usize = 9;
    pub const INST_12M: usize = 11;
    pub const INST_24M: usize = 13;
    pub const ACT_0M: usize = 15;
    pub const ACT_12M: usize = 17;
    pub const ACT_24M: usize = 19;
    pub const PENALTY: usize = 21;
}

/// Marker-column words that label headers or sections, never plans
const RESERVED_MARKERS: &[&str] = &["código", "codigo", "cobre", "gpon", "cobre/vrad"];

/// Description values that mark a sub-header row
const PLACEHOLDER_DESCRIPTIONS: &[&str] = &["planes", "descripción", "nan"];

const MAX_MARKER_LEN: usize = 6;
const MIN_CODE_LEN: usize = 3;

// ============================================================================
// TECHNOLOGY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Technology {
    Cobre,
    Gpon,
    #[default]
    General,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Cobre => "COBRE",
            Technology::Gpon => "GPON",
            Technology::General => "GENERAL",
        }
    }

    /// Technology announced by a marker cell, if any
    pub fn from_marker(marker: &str) -> Option<Self> {
        let upper = marker.to_uppercase();
        if upper.contains("COBRE") || upper.contains("VRAD") {
            Some(Technology::Cobre)
        } else if upper.contains("GPON") {
            Some(Technology::Gpon)
        } else {
            None
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COBRE" => Ok(Technology::Cobre),
            "GPON" => Ok(Technology::Gpon),
            "GENERAL" => Ok(Technology::General),
            other => Err(format!("unknown technology '{}'", other)),
        }
    }
}

// ============================================================================
// PLAN RECORD
// ============================================================================

/// One priced plan, fully coerced: every numeric field is a real number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub code: String,
    pub description: String,
    pub price: f64,
    pub alfa_code: String,
    pub category: String,
    pub technology: Technology,
    pub inst_0m: f64,
    pub inst_12m: f64,
    pub inst_24m: f64,
    pub act_0m: f64,
    pub act_12m: f64,
    pub act_24m: f64,
    pub penalty: f64,
}

impl PlanRecord {
    /// Display name: the description capped at 200 characters, or `Plan <code>`
    pub fn display_name(&self) -> String {
        if self.description.is_empty() {
            format!("Plan {}", self.code)
        } else {
            self.description.chars().take(200).collect()
        }
    }

    pub fn numeric_fields(&self) -> [f64; 8] {
        [
            self.price,
            self.inst_0m,
            self.inst_12m,
            self.inst_24m,
            self.act_0m,
            self.act_12m,
            self.act_24m,
            self.penalty,
        ]
    }
}

// ============================================================================
// EXTRACTION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 0-based row index in the sheet
    pub row: usize,
    pub error: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<PlanRecord>,
    pub skipped: Vec<SkippedRow>,
    pub rows_scanned: usize,
    /// Technology in effect after the last row
    pub technology: Technology,
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct Extractor {
    table: CategoryTable,
    price_mode: PriceMode,
}

impl Extractor {
    pub fn new(table: CategoryTable) -> Self {
        Extractor {
            table,
            price_mode: PriceMode::default(),
        }
    }

    pub fn with_price_mode(mut self, price_mode: PriceMode) -> Self {
        self.price_mode = price_mode;
        self
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    pub fn price_mode(&self) -> PriceMode {
        self.price_mode
    }

    /// Process one row given the technology in effect before it.
    ///
    /// Returns the technology in effect after the row together with the
    /// plan read from it, if the row is a plan row.
    pub fn step(
        &self,
        technology: Technology,
        row: &Row,
    ) -> (Technology, Result<Option<PlanRecord>, RowError>) {
        let marker = row.text(columns::MARKER);

        let technology = match marker.and_then(Technology::from_marker) {
            Some(next) => {
                if next != technology {
                    trace!("technology section {} -> {}", technology, next);
                }
                next
            }
            None => technology,
        };

        let plan = match marker.and_then(candidate_code) {
            Some(code) => self.read_plan(code, technology, row),
            None => Ok(None),
        };

        (technology, plan)
    }

    fn read_plan(
        &self,
        code: &str,
        technology: Technology,
        row: &Row,
    ) -> Result<Option<PlanRecord>, RowError> {
        let description = match row.get(columns::DESCRIPTION) {
            Some(cell) => cell.render(columns::DESCRIPTION)?,
            None => String::new(),
        };

        if PLACEHOLDER_DESCRIPTIONS.contains(&description.to_lowercase().as_str()) {
            return Ok(None);
        }

        let alfa_code = match row.get(columns::ALFA_CODE) {
            Some(cell) => cell.render(columns::ALFA_CODE)?,
            None => String::new(),
        };
        let alfa_code = if alfa_code == "nan" { String::new() } else { alfa_code };

        let price = parse_price(row.get(columns::PRICE), self.price_mode)?;
        let cost = |column: usize| safe_numeric(row.get(column));

        Ok(Some(PlanRecord {
            code: code.to_string(),
            price,
            alfa_code,
            category: self.table.classify(&description).to_string(),
            technology,
            inst_0m: cost(columns::INST_0M),
            inst_12m: cost(columns::INST_12M),
            inst_24m: cost(columns::INST_24M),
            act_0m: cost(columns::ACT_0M),
            act_12m: cost(columns::ACT_12M),
            act_24m: cost(columns::ACT_24M),
            penalty: cost(columns::PENALTY),
            description,
        }))
    }

    /// Run a full pass. Rows that fail are recorded and skipped.
    pub fn extract<'a, I>(&self, rows: I) -> Extraction
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let extraction = rows.into_iter().enumerate().fold(
            Extraction::default(),
            |mut acc, (index, row)| {
                let (technology, plan) = self.step(acc.technology, row);
                acc.technology = technology;
                acc.rows_scanned += 1;

                match plan {
                    Ok(Some(record)) => acc.records.push(record),
                    Ok(None) => {}
                    Err(error) => {
                        debug!("row {} skipped: {}", index, error);
                        acc.skipped.push(SkippedRow { row: index, error });
                    }
                }
                acc
            },
        );

        debug!(
            "extracted {} plans from {} rows ({} skipped)",
            extraction.records.len(),
            extraction.rows_scanned,
            extraction.skipped.len()
        );

        extraction
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::new(CategoryTable::default())
    }
}

/// The trimmed plan code when the marker cell looks like one
fn candidate_code(marker: &str) -> Option<&str> {
    if marker.is_empty() || marker.chars().count() > MAX_MARKER_LEN {
        return None;
    }

    let code = marker.trim();
    let first = code.chars().next()?;

    if RESERVED_MARKERS.contains(&code.to_lowercase().as_str())
        || !first.is_alphanumeric()
        || code.chars().count() < MIN_CODE_LEN
    {
        return None;
    }

    Some(code)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::rules::Preset;
    use pretty_assertions::assert_eq;

    /// Build a 22-column catalog row; unspecified columns are empty
    fn plan_row(marker: &str, description: &str, price: &str, alfa: &str) -> Row {
        let mut cells = vec![Cell::Empty; 22];
        cells[columns::MARKER] = Cell::text(marker);
        cells[columns::DESCRIPTION] = Cell::text(description);
        cells[columns::PRICE] = Cell::text(price);
        cells[columns::ALFA_CODE] = Cell::text(alfa);
        Row::new(cells)
    }

    fn marker_row(marker: &str) -> Row {
        Row::new(vec![Cell::Empty, Cell::text(marker)])
    }

    #[test]
    fn test_end_to_end_gpon_plan() {
        let extractor = Extractor::default();
        let rows = vec![
            marker_row("GPON"),
            plan_row("GPO-01", "3PLAY BANDA ANCHA", "1500", "ALFA1"),
        ];

        let result = extractor.extract(&rows);

        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0],
            PlanRecord {
                code: "GPO-01".into(),
                description: "3PLAY BANDA ANCHA".into(),
                price: 1500.0,
                alfa_code: "ALFA1".into(),
                category: "3PLAY".into(),
                technology: Technology::Gpon,
                inst_0m: 0.0,
                inst_12m: 0.0,
                inst_24m: 0.0,
                act_0m: 0.0,
                act_12m: 0.0,
                act_24m: 0.0,
                penalty: 0.0,
            }
        );
    }

    #[test]
    fn test_technology_is_sticky() {
        let extractor = Extractor::default();
        let rows = vec![
            plan_row("A01", "Plan inicial", "10", ""),
            marker_row("GPON"),
            plan_row("G01", "2PLAY 100M", "60", ""),
            Row::new(vec![Cell::Empty, Cell::text("Notas varias")]),
            plan_row("G02", "2PLAY 200M", "80", ""),
            marker_row("COBRE/VRAD"),
            plan_row("C01", "2PLAY 10M", "40", ""),
        ];

        let techs: Vec<Technology> = extractor
            .extract(&rows)
            .records
            .iter()
            .map(|r| r.technology)
            .collect();

        assert_eq!(
            techs,
            vec![
                Technology::General,
                Technology::Gpon,
                Technology::Gpon,
                Technology::Cobre
            ]
        );
    }

    #[test]
    fn test_technology_display_honors_width() {
        assert_eq!(format!("[{:<8}]", Technology::Gpon), "[GPON    ]");
        assert_eq!(format!("[{:>7}]", Technology::Cobre), "[  COBRE]");
        assert_eq!(Technology::General.to_string(), "GENERAL");
    }

    #[test]
    fn test_vrad_marker_switches_to_cobre() {
        assert_eq!(Technology::from_marker("vrad"), Some(Technology::Cobre));
        assert_eq!(Technology::from_marker("Cobre/VRAD"), Some(Technology::Cobre));
        assert_eq!(Technology::from_marker("gpon"), Some(Technology::Gpon));
        assert_eq!(Technology::from_marker("Planes"), None);
    }

    #[test]
    fn test_header_rows_never_emitted() {
        let extractor = Extractor::default();
        let rows = vec![
            plan_row("Código", "Descripción", "Precio", "Alfa"),
            plan_row("CÓDIGO", "Otro", "1", ""),
            plan_row("codigo", "Otro", "1", ""),
            plan_row("GPON", "Sección", "", ""),
        ];

        assert!(extractor.extract(&rows).records.is_empty());
    }

    #[test]
    fn test_placeholder_descriptions_skipped() {
        let extractor = Extractor::default();
        let rows = vec![
            plan_row("P01", "nan", "10", ""),
            plan_row("P02", "NaN", "10", ""),
            plan_row("P03", "Planes", "10", ""),
            plan_row("P04", "DESCRIPCIÓN", "10", ""),
        ];

        let result = extractor.extract(&rows);
        assert!(result.records.is_empty());
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_candidate_code_rules() {
        assert_eq!(candidate_code("BUS10"), Some("BUS10"));
        assert_eq!(candidate_code(" 123 "), Some("123"));
        assert_eq!(candidate_code("AB"), None);
        assert_eq!(candidate_code("TOOLONG"), None);
        assert_eq!(candidate_code("-X12"), None);
        assert_eq!(candidate_code(""), None);
        assert_eq!(candidate_code("   "), None);
    }

    #[test]
    fn test_numeric_marker_is_not_a_plan() {
        let extractor = Extractor::default();
        let mut cells = vec![Cell::Empty; 6];
        cells[columns::MARKER] = Cell::Number(1234.0);
        cells[columns::DESCRIPTION] = Cell::text("Plan numérico");

        assert!(extractor.extract(&[Row::new(cells)]).records.is_empty());
    }

    #[test]
    fn test_cost_fields_default_to_zero() {
        let extractor = Extractor::default();
        let mut cells = vec![Cell::Empty; 20];
        cells[columns::MARKER] = Cell::text("BML5");
        cells[columns::DESCRIPTION] = Cell::text("BML 5 lineas");
        cells[columns::INST_0M] = Cell::text("-");
        cells[columns::INST_12M] = Cell::text("");
        cells[columns::INST_24M] = Cell::Number(25.0);
        cells[columns::ACT_0M] = Cell::text("35.5");
        // PENALTY is past the end of this row

        let record = &extractor.extract(&[Row::new(cells)]).records[0];
        assert_eq!(record.inst_0m, 0.0);
        assert_eq!(record.inst_12m, 0.0);
        assert_eq!(record.inst_24m, 25.0);
        assert_eq!(record.act_0m, 35.5);
        assert_eq!(record.act_24m, 0.0);
        assert_eq!(record.penalty, 0.0);
        assert_eq!(record.price, 0.0);
        assert_eq!(record.category, "TV");
    }

    #[test]
    fn test_failing_row_does_not_abort_pass() {
        let extractor = Extractor::default();
        let mut broken = vec![Cell::Empty; 8];
        broken[columns::MARKER] = Cell::text("ERR1");
        broken[columns::DESCRIPTION] = Cell::Invalid("#REF!".into());

        let rows = vec![
            marker_row("GPON"),
            Row::new(broken),
            plan_row("OK1", "MOVIL 5GB", "20", ""),
        ];

        let result = extractor.extract(&rows);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].code, "OK1");
        assert_eq!(result.records[0].technology, Technology::Gpon);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].row, 1);
        assert_eq!(result.rows_scanned, 3);
    }

    #[test]
    fn test_separated_price_drops_row_in_legacy_mode() {
        let extractor = Extractor::default();
        let rows = vec![
            plan_row("PR1", "2PLAY 100M", "1,500", ""),
            plan_row("PR2", "2PLAY 200M", "$50", ""),
        ];

        let result = extractor.extract(&rows);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].code, "PR2");
        assert_eq!(result.records[0].price, 0.0);
        assert_eq!(
            result.skipped,
            vec![SkippedRow {
                row: 0,
                error: RowError::InvalidPrice {
                    value: "1,500".to_string()
                },
            }]
        );
    }

    #[test]
    fn test_nan_alfa_code_is_blank() {
        let extractor = Extractor::default();
        let rows = vec![plan_row("X10", "2 PLAY", "30", "nan")];
        assert_eq!(extractor.extract(&rows).records[0].alfa_code, "");
    }

    #[test]
    fn test_preset_b_and_lenient_price() {
        let extractor = Extractor::new(CategoryTable::preset(Preset::LegacyB))
            .with_price_mode(PriceMode::Lenient);
        assert_eq!(extractor.table().name, "legacy-b");
        assert_eq!(extractor.price_mode(), PriceMode::Lenient);
        let rows = vec![plan_row("PR1", "PRUS BASICO", "1,500.00", "")];

        let record = &extractor.extract(&rows).records[0];
        assert_eq!(record.category, "1PLAY");
        assert_eq!(record.price, 1500.0);
    }

    #[test]
    fn test_display_name() {
        let extractor = Extractor::default();
        let rows = vec![plan_row("E01", "", "0", "")];
        let record = &extractor.extract(&rows).records[0];
        assert_eq!(record.display_name(), "Plan E01");

        let long = "X".repeat(250);
        let rows = vec![plan_row("E02", &long, "0", "")];
        assert_eq!(extractor.extract(&rows).records[0].display_name().len(), 200);
    }

    #[test]
    fn test_step_threads_technology() {
        let extractor = Extractor::default();
        let (tech, plan) = extractor.step(Technology::Gpon, &marker_row("x"));
        assert_eq!(tech, Technology::Gpon);
        assert_eq!(plan, Ok(None));

        let (tech, _) = extractor.step(tech, &marker_row("COBRE"));
        assert_eq!(tech, Technology::Cobre);
    }
}
