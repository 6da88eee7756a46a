// 🧩 Template Sink - Plans as JSON inside a static HTML page

use crate::error::TemplateError;
use crate::extractor::PlanRecord;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const DEFAULT_PLACEHOLDER: &str = "PLANS_DATA_PLACEHOLDER";

/// Pretty JSON array of plans; non-ASCII text is written as-is
pub fn plans_json(plans: &[PlanRecord]) -> Result<String, TemplateError> {
    Ok(serde_json::to_string_pretty(plans)?)
}

/// Replace every occurrence of `placeholder` in `template` with the plans JSON
pub fn inject(
    template: &str,
    placeholder: &str,
    plans: &[PlanRecord],
) -> Result<String, TemplateError> {
    if placeholder.is_empty() || !template.contains(placeholder) {
        return Err(TemplateError::MissingPlaceholder(placeholder.to_string()));
    }
    Ok(template.replace(placeholder, &plans_json(plans)?))
}

/// Read a template file, inject the plans and write the result
pub fn render_file(
    template_path: &Path,
    output_path: &Path,
    placeholder: &str,
    plans: &[PlanRecord],
) -> Result<()> {
    let template = fs::read_to_string(template_path)
        .with_context(|| format!("Failed to read template: {}", template_path.display()))?;

    let html = inject(&template, placeholder, plans)
        .with_context(|| format!("Failed to fill template: {}", template_path.display()))?;

    fs::write(output_path, html)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Technology;

    fn plan(code: &str, description: &str) -> PlanRecord {
        PlanRecord {
            code: code.to_string(),
            description: description.to_string(),
            price: 35.0,
            alfa_code: String::new(),
            category: "MOVIL".to_string(),
            technology: Technology::General,
            inst_0m: 0.0,
            inst_12m: 0.0,
            inst_24m: 0.0,
            act_0m: 0.0,
            act_12m: 0.0,
            act_24m: 0.0,
            penalty: 0.0,
        }
    }

    #[test]
    fn test_inject_replaces_placeholder() {
        let template = "<script>const PLANS = PLANS_DATA_PLACEHOLDER;</script>";
        let html = inject(template, DEFAULT_PLACEHOLDER, &[plan("M01", "Plan Móvil")]).unwrap();

        assert!(!html.contains(DEFAULT_PLACEHOLDER));
        assert!(html.contains("\"code\": \"M01\""));
        assert!(html.contains("Plan Móvil"));
        assert!(html.contains("\"alfa_code\": \"\""));
        assert!(html.contains("\"technology\": \"GENERAL\""));
    }

    #[test]
    fn test_injected_json_parses_back() {
        let plans = vec![plan("M01", "uno"), plan("M02", "dos \"comillas\"")];
        let html = inject("[[X]]", "[[X]]", &plans).unwrap();

        let parsed: Vec<PlanRecord> = serde_json::from_str(&html).unwrap();
        assert_eq!(parsed, plans);
    }

    #[test]
    fn test_missing_placeholder_is_an_error() {
        let err = inject("<html></html>", DEFAULT_PLACEHOLDER, &[]).unwrap_err();
        assert!(matches!(err, TemplateError::MissingPlaceholder(_)));
    }

    #[test]
    fn test_render_file() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("planes.html");
        let output_path = dir.path().join("planes_final.html");
        fs::write(&template_path, "var data = PLANS_DATA_PLACEHOLDER;").unwrap();

        render_file(&template_path, &output_path, DEFAULT_PLACEHOLDER, &[plan("M01", "x")])
            .unwrap();

        let html = fs::read_to_string(&output_path).unwrap();
        assert!(html.starts_with("var data = ["));
    }
}
