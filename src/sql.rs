// 🧾 SQL Sink - Plans as INSERT statements, and back again
// Categories resolve through a subquery on plan_categories by code

use crate::db::{get_all_plans, setup_database};
use crate::extractor::PlanRecord;
use anyhow::{Context, Result};
use rusqlite::Connection;

const INSERT_PREFIX: &str = "INSERT INTO plans (category_id, name, code, alpha_code, description, price, technology, installation_0m, installation_12m, installation_24m, activation_0m, activation_12m, activation_24m, penalty, is_active)";

// ============================================================================
// RENDERING
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    /// Start the script with `DELETE FROM plans;`
    pub replace: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        ScriptOptions { replace: true }
    }
}

/// Quote a text literal, doubling single quotes
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Shortest representation that parses back to the same f64
fn number(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "0".to_string()
    }
}

pub fn render_insert(plan: &PlanRecord) -> String {
    format!(
        "{}\nVALUES ((SELECT id FROM plan_categories WHERE code = {}), {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, true);\n",
        INSERT_PREFIX,
        quote(&plan.category),
        quote(&plan.display_name()),
        quote(&plan.code),
        quote(&plan.alfa_code),
        quote(&plan.description),
        number(plan.price),
        quote(plan.technology.as_str()),
        number(plan.inst_0m),
        number(plan.inst_12m),
        number(plan.inst_24m),
        number(plan.act_0m),
        number(plan.act_12m),
        number(plan.act_24m),
        number(plan.penalty),
    )
}

pub fn render_script(plans: &[PlanRecord], options: ScriptOptions) -> String {
    let mut sql = String::new();

    if options.replace {
        sql.push_str("-- Replace existing plans\nDELETE FROM plans;\n\n");
    }
    sql.push_str("-- Insert plans\n");

    for plan in plans {
        sql.push_str(&render_insert(plan));
    }

    sql
}

// ============================================================================
// READING BACK
// ============================================================================

/// Read a script produced by `render_script` back into plan records.
///
/// The script runs against a fresh in-memory catalog, so SQLite itself parses
/// the literals and resolves the category subqueries.
pub fn read_script(script: &str) -> Result<Vec<PlanRecord>> {
    let conn = Connection::open_in_memory().context("Failed to open scratch database")?;
    setup_database(&conn)?;

    conn.execute_batch(script)
        .context("SQL script does not run against the plans schema")?;

    get_all_plans(&conn)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Technology;
    use pretty_assertions::assert_eq;

    fn sample_plan(code: &str, description: &str) -> PlanRecord {
        PlanRecord {
            code: code.to_string(),
            description: description.to_string(),
            price: 1499.99,
            alfa_code: "ALFA1".to_string(),
            category: "3PLAY".to_string(),
            technology: Technology::Gpon,
            inst_0m: 0.1,
            inst_12m: 49.95,
            inst_24m: 0.0,
            act_0m: 25.0,
            act_12m: 12.345678901234567,
            act_24m: 0.0,
            penalty: 300.0,
        }
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("O'Neill's"), "'O''Neill''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_render_insert_shape() {
        let sql = render_insert(&sample_plan("GPO-01", "3PLAY BANDA ANCHA"));

        assert!(sql.starts_with(INSERT_PREFIX));
        assert!(sql.contains("(SELECT id FROM plan_categories WHERE code = '3PLAY')"));
        assert!(sql.contains("'GPO-01'"));
        assert!(sql.contains(", 1499.99, 'GPON', 0.1, 49.95, 0, 25,"));
        assert!(sql.trim_end().ends_with("true);"));
        assert!(!sql.contains("NULL"));
    }

    #[test]
    fn test_script_header() {
        let plans = vec![sample_plan("A01", "x")];
        let replace = render_script(&plans, ScriptOptions::default());
        let append = render_script(&plans, ScriptOptions { replace: false });

        assert!(replace.contains("DELETE FROM plans;"));
        assert!(!append.contains("DELETE FROM plans;"));
    }

    #[test]
    fn test_round_trip_is_exact() {
        let plans = vec![
            sample_plan("GPO-01", "3PLAY BANDA ANCHA"),
            sample_plan("Q01", "Plan 'Oro' -- con; comentarios"),
            PlanRecord {
                price: 0.3 - 0.1,
                category: "MOVIL".to_string(),
                technology: Technology::General,
                ..sample_plan("N01", "Línea móvil ñ")
            },
        ];

        let script = render_script(&plans, ScriptOptions::default());
        let read_back = read_script(&script).unwrap();

        assert_eq!(read_back, plans);
        for (a, b) in read_back.iter().zip(&plans) {
            for (x, y) in a.numeric_fields().iter().zip(b.numeric_fields().iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn test_empty_description_uses_code_as_name() {
        let sql = render_insert(&sample_plan("E01", ""));
        assert!(sql.contains("'Plan E01'"));
        assert_eq!(read_script(&sql).unwrap()[0].description, "");
    }

    #[test]
    fn test_read_rejects_unterminated_string() {
        let sql = render_insert(&sample_plan("A01", "x"));
        let broken = sql.replace("'ALFA1'", "'ALFA1");
        assert!(read_script(&broken).is_err());
    }

    #[test]
    fn test_read_rejects_wrong_arity() {
        let sql = "INSERT INTO plans (code) VALUES ('A01', 1);";
        assert!(read_script(sql).is_err());
    }

    #[test]
    fn test_read_rejects_unknown_category() {
        let sql = render_insert(&PlanRecord {
            category: "NO_EXISTE".to_string(),
            ..sample_plan("X99", "x")
        });
        assert!(read_script(&sql).is_err());
    }
}
