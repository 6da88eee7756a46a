// 🏷️ Category Rules - Rules as Data
// Ordered keyword tables that map plan descriptions to category tags

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Tag assigned when any keyword matches (must exist in plan_categories)
    pub category: String,

    /// Substrings searched in the uppercased description
    pub keywords: Vec<String>,

    /// Notes about this rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryRule {
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        CategoryRule {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            description: None,
        }
    }

    /// Check an already-uppercased description against the keywords
    pub fn matches(&self, upper: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| upper.contains(&keyword.to_uppercase()))
    }
}

// ============================================================================
// PRESETS
// ============================================================================

/// The two historical keyword tables, kept side by side under explicit names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// Fixed-line plans are `FIJO`, broadband is `INTERNET`, fallback `FIJO`
    #[default]
    #[serde(rename = "legacy-a")]
    LegacyA,
    /// Fixed-line plans are `1PLAY`, broadband is `BANDA_ANCHA`, fallback `GENERAL`
    #[serde(rename = "legacy-b")]
    LegacyB,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::LegacyA => "legacy-a",
            Preset::LegacyB => "legacy-b",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy-a" | "a" => Ok(Preset::LegacyA),
            "legacy-b" | "b" => Ok(Preset::LegacyB),
            other => Err(format!(
                "unknown preset '{}' (expected legacy-a or legacy-b)",
                other
            )),
        }
    }
}

const TV_KEYWORDS: &[&str] = &["VERTICAL", "LINEA", "CONTRATO"];
const THREE_PLAY_KEYWORDS: &[&str] = &["3PLAY", "3 PLAY"];
const TWO_PLAY_KEYWORDS: &[&str] = &["2PLAY", "2 PLAY"];
const MOBILE_KEYWORDS: &[&str] = &["MOVIL", "MÓVIL", "GB", "CELULAR"];

// ============================================================================
// CATEGORY TABLE
// ============================================================================

/// Ordered rule list; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub name: String,
    pub rules: Vec<CategoryRule>,
    pub default_category: String,
}

/// Outcome of classifying one description
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<'a> {
    pub category: &'a str,
    /// Index of the matching rule, `None` when the default applied
    pub rule_index: Option<usize>,
}

impl CategoryTable {
    pub fn preset(preset: Preset) -> Self {
        let rules = match preset {
            Preset::LegacyA => vec![
                CategoryRule::new("TV", TV_KEYWORDS),
                CategoryRule::new("3PLAY", THREE_PLAY_KEYWORDS),
                CategoryRule::new("2PLAY", TWO_PLAY_KEYWORDS),
                CategoryRule::new(
                    "FIJO",
                    &["BUS", "BMS", "BML", "ILIM", "PRUS", "PR ", "REMOTE"],
                ),
                CategoryRule::new("MOVIL", MOBILE_KEYWORDS),
                CategoryRule::new("INTERNET", &["MODEM", "BANDA ANCHA", "INTERNET"]),
            ],
            Preset::LegacyB => vec![
                CategoryRule::new("TV", TV_KEYWORDS),
                CategoryRule::new("3PLAY", THREE_PLAY_KEYWORDS),
                CategoryRule::new("2PLAY", TWO_PLAY_KEYWORDS),
                CategoryRule::new("1PLAY", &["BUS", "BMS", "BML", "ILIM", "PRUS", "PR "]),
                CategoryRule::new("MOVIL", MOBILE_KEYWORDS),
                CategoryRule::new("BANDA_ANCHA", &["MODEM", "BANDA ANCHA"]),
            ],
        };

        let default_category = match preset {
            Preset::LegacyA => "FIJO",
            Preset::LegacyB => "GENERAL",
        };

        CategoryTable {
            name: preset.name().to_string(),
            rules,
            default_category: default_category.to_string(),
        }
    }

    /// Load a custom table from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let table: CategoryTable =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        if self.default_category.trim().is_empty() {
            bail!("Rules table '{}' has an empty default category", self.name);
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.category.trim().is_empty() {
                bail!("Rule {} in '{}' has an empty category", index, self.name);
            }
            if rule.keywords.iter().any(|k| k.is_empty()) {
                bail!("Rule {} in '{}' has an empty keyword", index, self.name);
            }
        }
        Ok(())
    }

    /// Classify a description, reporting which rule matched
    pub fn classify_detailed(&self, description: &str) -> Classification<'_> {
        let upper = description.to_uppercase();

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matches(&upper) {
                return Classification {
                    category: &rule.category,
                    rule_index: Some(index),
                };
            }
        }

        Classification {
            category: &self.default_category,
            rule_index: None,
        }
    }

    pub fn classify(&self, description: &str) -> &str {
        self.classify_detailed(description).category
    }

    /// Every tag this table can produce, default included
    pub fn categories(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .map(|rule| rule.category.as_str())
            .chain(std::iter::once(self.default_category.as_str()))
            .collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        CategoryTable::preset(Preset::default())
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
    fn test_precedence_3play_before_internet() {
        let table = CategoryTable::preset(Preset::LegacyA);
        assert_eq!(table.classify("INTERNET 3PLAY PYMES"), "3PLAY");
        assert_eq!(table.classify("Internet Banda Ancha 50 Mbps"), "INTERNET");
    }

    #[test]
    fn test_tv_wins_over_everything() {
        let table = CategoryTable::preset(Preset::LegacyA);
        // "LINEA" appears in "LINEA ADICIONAL 2PLAY"
        assert_eq!(table.classify("Linea adicional 2PLAY"), "TV");
        assert_eq!(table.classify("CONTRATO VERTICAL"), "TV");
    }

    #[test]
    fn test_fixed_line_tag_differs_between_presets() {
        let a = CategoryTable::preset(Preset::LegacyA);
        let b = CategoryTable::preset(Preset::LegacyB);
        assert_eq!(a.classify("PRUS BASICO"), "FIJO");
        assert_eq!(b.classify("PRUS BASICO"), "1PLAY");
    }

    #[test]
    fn test_remote_only_in_legacy_a() {
        let a = CategoryTable::preset(Preset::LegacyA);
        let b = CategoryTable::preset(Preset::LegacyB);
        assert_eq!(a.classify("REMOTE CALL FORWARD"), "FIJO");
        assert_eq!(b.classify("REMOTE CALL FORWARD"), "GENERAL");
    }

    #[test]
    fn test_broadband_and_defaults() {
        let a = CategoryTable::preset(Preset::LegacyA);
        let b = CategoryTable::preset(Preset::LegacyB);
        assert_eq!(b.classify("MODEM 20M"), "BANDA_ANCHA");
        assert_eq!(b.classify("INTERNET DEDICADO"), "GENERAL");
        assert_eq!(a.classify("Servicio especial"), "FIJO");
        assert_eq!(b.classify("Servicio especial"), "GENERAL");
    }

    #[test]
    fn test_accented_mobile_keyword() {
        let table = CategoryTable::preset(Preset::LegacyA);
        assert_eq!(table.classify("plan móvil empresas"), "MOVIL");
        assert_eq!(table.classify("10GB datos"), "MOVIL");
    }

    #[test]
    fn test_classify_detailed_reports_rule() {
        let table = CategoryTable::preset(Preset::LegacyA);
        let hit = table.classify_detailed("2 PLAY ILIMITADO");
        assert_eq!(hit.category, "2PLAY");
        assert_eq!(hit.rule_index, Some(2));

        let miss = table.classify_detailed("otra cosa");
        assert_eq!(miss.rule_index, None);
    }

    #[test]
    fn test_categories_include_default() {
        let table = CategoryTable::preset(Preset::LegacyB);
        let cats = table.categories();
        assert!(cats.contains("GENERAL"));
        assert!(cats.contains("1PLAY"));
        assert_eq!(cats.len(), 7);
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("legacy-a".parse::<Preset>(), Ok(Preset::LegacyA));
        assert_eq!("LEGACY-B".parse::<Preset>(), Ok(Preset::LegacyB));
        assert!("legacy-c".parse::<Preset>().is_err());
    }

    #[test]
    fn test_load_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "name": "custom",
                "default_category": "OTROS",
                "rules": [
                    {{"category": "TV", "keywords": ["TV+"]}},
                    {{"category": "MOVIL", "keywords": ["gb"], "description": "data plans"}}
                ]
            }}"#
        )
        .unwrap();

        let table = CategoryTable::from_file(file.path()).unwrap();
        assert_eq!(table.rule_count(), 2);
        assert_eq!(table.classify("Claro TV+ Max"), "TV");
        assert_eq!(table.classify("5gb"), "MOVIL");
        assert_eq!(table.classify("nada"), "OTROS");
    }

    #[test]
    fn test_reject_empty_keyword() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "bad", "default_category": "X", "rules": [{{"category": "TV", "keywords": [""]}}]}}"#
        )
        .unwrap();

        assert!(CategoryTable::from_file(file.path()).is_err());
    }
}
