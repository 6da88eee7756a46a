// 👥 Subscriber Roster - BAN/SUB exports → clients, bans, subscribers
// Lookup-or-insert keyed by BAN, partial client updates that never erase data

use crate::cell::{Cell, Row};
use crate::db::{insert_event, is_record_error, ImportEvent, SourceInfo, WriteFailure};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};

// ============================================================================
// ROSTER ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberRow {
    /// 1-based line in the export, header included
    pub line: usize,
    pub ban: String,
    pub sub: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
}

impl SubscriberRow {
    /// "First Last", or just the first name; `None` when there is no first name
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            _ => None,
        }
    }

    /// Subscriber status stored in the database
    pub fn db_status(&self) -> String {
        match self.status.as_deref().map(str::to_uppercase).as_deref() {
            Some("S") => "suspendido".to_string(),
            Some("A") | None => "activo".to_string(),
            Some(other) => other.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub rows: Vec<SubscriberRow>,
    /// Rows without a BAN or SUB
    pub missing_ids: usize,
    /// Rows whose status is outside the active set
    pub filtered_status: usize,
}

struct RosterColumns {
    ban: usize,
    sub: usize,
    first_name: Option<usize>,
    last_name: Option<usize>,
    company: Option<usize>,
    status: Option<usize>,
}

fn normalize_header(cell: &Cell) -> String {
    cell.to_string()
        .trim()
        .to_lowercase()
        .replace('ó', "o")
}

impl RosterColumns {
    fn from_header(header: &Row) -> Result<Self> {
        let names: Vec<String> = header.cells().iter().map(normalize_header).collect();
        let find = |wanted: &[&str]| names.iter().position(|n| wanted.contains(&n.as_str()));

        let ban = match find(&["ban"]) {
            Some(index) => index,
            None => bail!("Roster header has no BAN column"),
        };
        let sub = match find(&["sub", "suscriptor"]) {
            Some(index) => index,
            None => bail!("Roster header has no SUB column"),
        };

        Ok(RosterColumns {
            ban,
            sub,
            first_name: find(&["nombre", "first name"]),
            last_name: find(&["apellido", "last name"]),
            company: find(&["razon social", "company"]),
            status: find(&["status", "estado"]),
        })
    }
}

/// Trimmed text of a cell; blank and error cells read as `None`
fn value(row: &Row, column: Option<usize>) -> Option<String> {
    let cell = row.get(column?)?;
    if matches!(cell, Cell::Invalid(_)) {
        return None;
    }
    let text = cell.to_string().trim().to_string();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(text)
    }
}

/// Parse a roster sheet whose first row is the header.
///
/// Only rows whose status is in `active_statuses` are kept (case-insensitive);
/// an empty list keeps every status.
pub fn parse_roster(rows: &[Row], active_statuses: &[String]) -> Result<Roster> {
    let header = rows.first().context("Roster sheet is empty")?;
    let columns = RosterColumns::from_header(header)?;
    let mut roster = Roster::default();

    for (index, row) in rows.iter().enumerate().skip(1) {
        if row.is_empty() {
            continue;
        }

        let status = value(row, columns.status);
        if !active_statuses.is_empty() {
            let keep = status.as_deref().is_some_and(|s| {
                active_statuses.iter().any(|a| a.eq_ignore_ascii_case(s))
            });
            if !keep {
                roster.filtered_status += 1;
                continue;
            }
        }

        let (ban, sub) = match (value(row, Some(columns.ban)), value(row, Some(columns.sub))) {
            (Some(ban), Some(sub)) => (ban, sub),
            _ => {
                roster.missing_ids += 1;
                continue;
            }
        };

        roster.rows.push(SubscriberRow {
            line: index + 1,
            ban,
            sub,
            first_name: value(row, columns.first_name),
            last_name: value(row, columns.last_name),
            company: value(row, columns.company),
            status,
        });
    }

    debug!(
        "roster: {} rows kept, {} without BAN/SUB, {} filtered by status",
        roster.rows.len(),
        roster.missing_ids,
        roster.filtered_status
    );

    Ok(roster)
}

// ============================================================================
// UPSERT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New client and BAN
    Created { subscriber_added: bool },
    /// Existing BAN; client fields refreshed
    Updated { subscriber_added: bool },
}

#[derive(Debug, Clone, Default)]
pub struct RosterSummary {
    pub created: usize,
    pub updated: usize,
    pub subscribers_added: usize,
    pub failures: Vec<WriteFailure>,
}

impl RosterSummary {
    /// The first `limit` failures, for the operator
    pub fn preview(&self, limit: usize) -> &[WriteFailure] {
        &self.failures[..self.failures.len().min(limit)]
    }
}

fn upsert_subscriber(conn: &Connection, row: &SubscriberRow) -> rusqlite::Result<UpsertOutcome> {
    let now = Utc::now().to_rfc3339();
    let name = row.full_name();

    let existing: Option<(i64, i64)> = conn
        .query_row(
            "SELECT id, client_id FROM bans WHERE number = ?1",
            params![row.ban],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let (ban_id, created) = match existing {
        Some((ban_id, client_id)) => {
            // Missing incoming values keep what is stored
            conn.execute(
                "UPDATE clients
                 SET name = COALESCE(?1, name),
                     company = COALESCE(?2, company),
                     updated_at = ?3
                 WHERE id = ?4",
                params![name, row.company, now, client_id],
            )?;
            (ban_id, false)
        }
        None => {
            let name = name.unwrap_or_else(|| format!("Cliente BAN {}", row.ban));
            let company = row
                .company
                .clone()
                .unwrap_or_else(|| format!("Empresa BAN {}", row.ban));

            conn.execute(
                "INSERT INTO clients (name, company, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, company, now],
            )?;
            let client_id = conn.last_insert_rowid();

            conn.execute(
                "INSERT INTO bans (client_id, number, status, created_at)
                 VALUES (?1, ?2, 'activo', ?3)",
                params![client_id, row.ban, now],
            )?;
            (conn.last_insert_rowid(), true)
        }
    };

    let subscriber: Option<i64> = conn
        .query_row(
            "SELECT id FROM subscribers WHERE ban_id = ?1 AND phone_number = ?2",
            params![ban_id, row.sub],
            |r| r.get(0),
        )
        .optional()?;

    let subscriber_added = match subscriber {
        Some(_) => false,
        None => {
            conn.execute(
                "INSERT INTO subscribers (ban_id, phone_number, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ban_id, row.sub, row.db_status(), now],
            )?;
            true
        }
    };

    Ok(if created {
        UpsertOutcome::Created { subscriber_added }
    } else {
        UpsertOutcome::Updated { subscriber_added }
    })
}

/// Import a roster in one transaction.
///
/// Each row runs inside a savepoint so a rejected row leaves no partial
/// client/BAN behind. Rejected rows are collected; any other error rolls the
/// whole import back.
pub fn import_roster(
    conn: &mut Connection,
    rows: &[SubscriberRow],
    source: &SourceInfo,
) -> Result<RosterSummary> {
    let mut tx = conn.transaction()?;
    let mut summary = RosterSummary::default();

    for (processed, row) in rows.iter().enumerate() {
        if processed > 0 && processed % 100 == 0 {
            debug!("processed {}/{} roster rows", processed, rows.len());
        }

        let sp = tx.savepoint()?;
        match upsert_subscriber(&sp, row) {
            Ok(outcome) => {
                sp.commit()?;
                let subscriber_added = match outcome {
                    UpsertOutcome::Created { subscriber_added } => {
                        summary.created += 1;
                        subscriber_added
                    }
                    UpsertOutcome::Updated { subscriber_added } => {
                        summary.updated += 1;
                        subscriber_added
                    }
                };
                if subscriber_added {
                    summary.subscribers_added += 1;
                }
            }
            Err(e) if is_record_error(&e) => {
                // Dropping the savepoint rolls this row back
                drop(sp);
                warn!("roster line {} (BAN {}) rejected: {}", row.line, row.ban, e);
                summary.failures.push(WriteFailure {
                    record: format!("line {}", row.line),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Fatal error at roster line {}", row.line)
                })
            }
        }
    }

    let event = ImportEvent::new(
        "roster_imported",
        source,
        serde_json::json!({
            "created": summary.created,
            "updated": summary.updated,
            "subscribers_added": summary.subscribers_added,
            "failed": summary.failures.len(),
        }),
    );
    insert_event(&tx, &event)?;

    tx.commit()?;
    info!(
        "roster imported: {} created, {} updated, {} failed",
        summary.created,
        summary.updated,
        summary.failures.len()
    );

    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================
