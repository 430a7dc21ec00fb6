use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
/// Public struct `BotConfigFile` mirroring the TOML configuration file.
pub struct BotConfigFile {
    /// Five-field cron expression, or six/seven fields with seconds.
    pub cron_expression: String,
    /// First moment reports may fire, `YYYY-MM-DD HH:MM` in `timezone`.
    pub cron_start_date: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// State labels listed in reports, in section order.
    pub report_states: Vec<String>,
    pub members_file: PathBuf,
    pub projects_file: PathBuf,
}

/// Reads and validates the TOML file. Relative directory file paths are
/// resolved against the directory that holds the configuration file.
pub fn load_bot_config(path: &Path) -> Result<BotConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut config: BotConfigFile =
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;

    if config.cron_expression.trim().is_empty() {
        bail!("{}: cron_expression cannot be empty", path.display());
    }
    config.report_states = config
        .report_states
        .iter()
        .map(|state| state.trim().to_string())
        .collect();
    if config.report_states.is_empty() || config.report_states.iter().any(String::is_empty) {
        bail!(
            "{}: report_states must list at least one non-empty state label",
            path.display()
        );
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    config.members_file = resolve_relative(base_dir, &config.members_file);
    config.projects_file = resolve_relative(base_dir, &config.projects_file);
    Ok(config)
}

fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
