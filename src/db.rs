use crate::extractor::{PlanRecord, Technology};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Categories every catalog load can reference (both presets' tags)
/// code, name, description, color, display order
const SEED_CATEGORIES: &[(&str, &str, &str, &str, i64)] = &[
    ("MEDIDOS", "Planes Medidos", "Planes de telefonía medidos", "orange", 1),
    ("1PLAY", "1Play", "Planes de voz fija (1 Play)", "blue", 2),
    ("FIJO", "Fijo", "Telefonía fija", "blue", 3),
    ("2PLAY", "2Play", "Planes Internet + Voz (2 Play)", "cyan", 4),
    ("3PLAY", "3Play", "Planes Internet + Voz + TV (3 Play)", "teal", 5),
    ("TV", "Claro TV", "Planes de televisión", "pink", 6),
    ("MOVIL", "Móvil", "Planes celulares", "green", 7),
    ("INTERNET", "Internet", "Internet y banda ancha", "purple", 8),
    ("BANDA_ANCHA", "Banda Ancha", "Módem y banda ancha", "purple", 9),
    ("GENERAL", "General", "Planes sin clasificar", "gray", 10),
];

/// Where the rows of a run came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file: String,
    pub sha256: String,
}

/// Event for audit trail: one per committed database run
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub source: SourceInfo,
    pub data: serde_json::Value,
}

impl ImportEvent {
    pub fn new(event_type: &str, source: &SourceInfo, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            source: source.clone(),
            data,
        }
    }
}

/// A record the database refused; the run carries on without it
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    /// Plan code or roster line the failure belongs to
    pub record: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub inserted: usize,
    pub failures: Vec<WriteFailure>,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Catalog tables
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS plan_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            color TEXT,
            display_order INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES plan_categories(id),
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            alpha_code TEXT,
            description TEXT,
            price REAL NOT NULL DEFAULT 0,
            technology TEXT NOT NULL,
            installation_0m REAL NOT NULL DEFAULT 0,
            installation_12m REAL NOT NULL DEFAULT 0,
            installation_24m REAL NOT NULL DEFAULT 0,
            activation_0m REAL NOT NULL DEFAULT 0,
            activation_12m REAL NOT NULL DEFAULT 0,
            activation_24m REAL NOT NULL DEFAULT 0,
            penalty REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Customer hierarchy: clients → bans → subscribers
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            company TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id),
            number TEXT UNIQUE NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscribers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ban_id INTEGER NOT NULL REFERENCES bans(id),
            phone_number TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (ban_id, phone_number)
        )",
        [],
    )?;

    // ==========================================================================
    // Import events (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            source_file TEXT NOT NULL,
            source_sha256 TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plans_code ON plans(code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscribers_ban ON subscribers(ban_id)",
        [],
    )?;

    seed_categories(conn)?;

    Ok(())
}

/// Insert the known category codes, leaving existing rows untouched
pub fn seed_categories(conn: &Connection) -> Result<usize> {
    let mut added = 0;
    for (code, name, description, color, order) in SEED_CATEGORIES {
        added += conn.execute(
            "INSERT OR IGNORE INTO plan_categories (code, name, description, color, display_order, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![code, name, description, color, order],
        )?;
    }
    Ok(added)
}

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Constraint violations belong to one record; anything else ends the run
pub(crate) fn is_record_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Load a catalog in one transaction.
///
/// With `replace`, existing plans are deleted first. Plans the database rejects
/// (unknown category code, ...) are collected in the summary; any other error
/// rolls the whole load back.
pub fn load_plans(
    conn: &mut Connection,
    plans: &[PlanRecord],
    replace: bool,
    source: &SourceInfo,
) -> Result<LoadSummary> {
    let tx = conn.transaction()?;
    let mut summary = LoadSummary::default();

    if replace {
        let removed = tx.execute("DELETE FROM plans", [])?;
        info!("removed {} existing plans", removed);
    }

    for plan in plans {
        let result = tx.execute(
            "INSERT INTO plans (
                category_id, name, code, alpha_code, description, price, technology,
                installation_0m, installation_12m, installation_24m,
                activation_0m, activation_12m, activation_24m, penalty, is_active
            ) VALUES (
                (SELECT id FROM plan_categories WHERE code = ?1),
                ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1
            )",
            params![
                plan.category,
                plan.display_name(),
                plan.code,
                plan.alfa_code,
                plan.description,
                plan.price,
                plan.technology.as_str(),
                plan.inst_0m,
                plan.inst_12m,
                plan.inst_24m,
                plan.act_0m,
                plan.act_12m,
                plan.act_24m,
                plan.penalty,
            ],
        );

        match result {
            Ok(_) => summary.inserted += 1,
            Err(e) if is_record_error(&e) => {
                warn!("plan {} ({}) rejected: {}", plan.code, plan.category, e);
                summary.failures.push(WriteFailure {
                    record: plan.code.clone(),
                    message: format!("category {}: {}", plan.category, e),
                });
            }
            Err(e) => return Err(e).context("Fatal error while loading plans"),
        }
    }

    let event = ImportEvent::new(
        "plans_loaded",
        source,
        serde_json::json!({
            "inserted": summary.inserted,
            "failed": summary.failures.len(),
            "replace": replace,
        }),
    );
    insert_event(&tx, &event)?;

    tx.commit()?;
    info!(
        "loaded {} plans ({} rejected)",
        summary.inserted,
        summary.failures.len()
    );

    Ok(summary)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &ImportEvent) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO import_events (
            event_id, timestamp, event_type, source_file, source_sha256, data
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.source.file,
            event.source.sha256,
            data_json,
        ],
    )?;

    Ok(())
}

/// Get events of one type, newest first
pub fn get_events(conn: &Connection, event_type: &str) -> Result<Vec<ImportEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, source_file, source_sha256, data
         FROM import_events
         WHERE event_type = ?1
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![event_type], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(ImportEvent {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                source: SourceInfo {
                    file: row.get(3)?,
                    sha256: row.get(4)?,
                },
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Read the stored catalog back, in insertion order
pub fn get_all_plans(conn: &Connection) -> Result<Vec<PlanRecord>> {
    let mut stmt = conn.prepare(
        "SELECT p.code, p.description, p.price, p.alpha_code, c.code, p.technology,
                p.installation_0m, p.installation_12m, p.installation_24m,
                p.activation_0m, p.activation_12m, p.activation_24m, p.penalty
         FROM plans p
         JOIN plan_categories c ON c.id = p.category_id
         ORDER BY p.id",
    )?;

    let plans = stmt
        .query_map([], |row| {
            let technology: String = row.get(5)?;

            Ok(PlanRecord {
                code: row.get(0)?,
                description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                price: row.get(2)?,
                alfa_code: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                category: row.get(4)?,
                technology: technology
                    .parse::<Technology>()
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                inst_0m: row.get(6)?,
                inst_12m: row.get(7)?,
                inst_24m: row.get(8)?,
                act_0m: row.get(9)?,
                act_12m: row.get(10)?,
                act_24m: row.get(11)?,
                penalty: row.get(12)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(plans)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}
