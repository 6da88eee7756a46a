// 📊 Reports - Catalog summaries and sheet layout inspection

use crate::cell::Row;
use crate::extractor::{Extraction, PlanRecord, Technology};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

// ============================================================================
// CATALOG SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogSummary {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_technology: BTreeMap<Technology, usize>,
    pub rows_scanned: usize,
    pub skipped_rows: usize,
}

impl CatalogSummary {
    pub fn from_plans(plans: &[PlanRecord]) -> Self {
        let mut summary = CatalogSummary {
            total: plans.len(),
            ..Default::default()
        };

        for plan in plans {
            *summary.by_category.entry(plan.category.clone()).or_insert(0) += 1;
            *summary.by_technology.entry(plan.technology).or_insert(0) += 1;
        }

        summary
    }

    pub fn from_extraction(extraction: &Extraction) -> Self {
        CatalogSummary {
            rows_scanned: extraction.rows_scanned,
            skipped_rows: extraction.skipped.len(),
            ..Self::from_plans(&extraction.records)
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "✅ Total plans: {}", self.total);
        if self.rows_scanned > 0 {
            let _ = writeln!(
                out,
                "   Rows scanned: {} ({} skipped)",
                self.rows_scanned, self.skipped_rows
            );
        }

        let _ = writeln!(out, "\n📊 Categories:");
        for (category, count) in &self.by_category {
            let _ = writeln!(out, "  {}: {} plans", category, count);
        }

        let _ = writeln!(out, "\n🔌 Technologies:");
        for (technology, count) in &self.by_technology {
            let _ = writeln!(out, "  {}: {} plans", technology, count);
        }

        out
    }
}

/// One line per plan, for console output
pub fn plan_line(plan: &PlanRecord) -> String {
    format!(
        "{:<6} {:<8} {:<11} {:>10.2}  {}",
        plan.code, plan.technology, plan.category, plan.price, plan.description
    )
}

// ============================================================================
// LAYOUT INSPECTION
// ============================================================================

/// Words that usually label a section or header row in the catalog sheet
const SECTION_KEYWORDS: &[&str] = &[
    "Planes ",
    "PLAY",
    "Play",
    "TV",
    "Claro",
    "Código",
    "COBRE",
    "GPON",
    "LISTADO",
    "Complemento",
    "Lineas Adicionales",
];

const INSPECT_COLUMNS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SectionRow {
    pub row: usize,
    pub text: String,
}

/// Rows whose first ten cells mention a section keyword
pub fn section_rows(rows: &[Row]) -> Vec<SectionRow> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let cells: Vec<String> = row
                .cells()
                .iter()
                .take(INSPECT_COLUMNS)
                .map(|c| c.to_string().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();

            if cells.is_empty() {
                return None;
            }

            let text = cells.join(" ");
            SECTION_KEYWORDS
                .iter()
                .any(|k| text.contains(k))
                .then(|| SectionRow {
                    row: index,
                    text: text.chars().take(80).collect(),
                })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
