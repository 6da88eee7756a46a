// ⚙️ Configuration - Optional plan-catalog.toml with per-key defaults

use crate::cell::PriceMode;
use crate::rules::Preset;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "plan-catalog.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
    pub roster: RosterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub preset: Preset,
    pub price_mode: PriceMode,
    /// JSON category table; takes precedence over `preset`
    pub rules_file: Option<PathBuf>,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub placeholder: String,
    /// Emit/run `DELETE FROM plans` before inserting
    pub replace: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            placeholder: crate::template::DEFAULT_PLACEHOLDER.to_string(),
            replace: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("plan-catalog.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub active_statuses: Vec<String>,
    pub sheet: Option<String>,
    pub error_preview: usize,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            active_statuses: vec!["A".to_string(), "S".to_string()],
            sheet: None,
            error_preview: 5,
        }
    }
}

/// Load an explicit config file, or `plan-catalog.toml` when present,
/// or fall back to defaults.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => load_file(p),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                load_file(default)
            } else {
                log::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Ok(AppConfig::default())
            }
        }
    }
}

pub fn load_file(path: &Path) -> Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: AppConfig = toml::from_str(&text)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}
