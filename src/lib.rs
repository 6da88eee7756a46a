// Plan Catalog - Core Library
// Exposes all modules for use in the CLI and tests

pub mod cell;       // Untyped cells, rows, numeric coercion
pub mod config;     // plan-catalog.toml
pub mod db;         // SQLite sink + audit events
pub mod error;      // Typed errors
pub mod extractor;  // Row → PlanRecord fold
pub mod report;     // Summaries + layout inspection
pub mod roster;     // BAN/SUB roster upsert
pub mod rules;      // Category keyword tables
pub mod source;     // CSV / workbook readers
pub mod sql;        // SQL script sink
pub mod template;   // HTML template sink

// Re-export commonly used types
pub use cell::{parse_price, safe_numeric, Cell, PriceMode, Row};
pub use config::AppConfig;
pub use db::{
    get_all_plans, get_events, load_plans, open_database, setup_database, ImportEvent,
    LoadSummary, SourceInfo, WriteFailure,
};
pub use error::{RowError, TemplateError};
pub use extractor::{Extraction, Extractor, PlanRecord, SkippedRow, Technology};
pub use report::{section_rows, CatalogSummary, SectionRow};
pub use roster::{import_roster, parse_roster, Roster, RosterSummary, SubscriberRow};
pub use rules::{CategoryRule, CategoryTable, Classification, Preset};
pub use source::{detect_format, fingerprint, get_reader, load_rows, SheetReader, SourceFormat};
pub use sql::{read_script, render_script, ScriptOptions};
pub use template::{inject, plans_json, DEFAULT_PLACEHOLDER};

/// Library version, also reported by `plan-catalog --version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
