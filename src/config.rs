//! Configuration for the dashboard engine
//!
//! Values are resolved in this order (highest first):
//! 1. CLI flags (`--data-dir`, ...)
//! 2. Environment variables (`SERIEA_DATA_DIR`, ...), read by the CLI
//! 3. Config file (`seriea.toml`)
//! 4. Built-in defaults
//!
//! ```toml
//! data_dir = "data"
//! default_min_points = 50
//! default_limit = 10
//!
//! [charts]
//! teams_min_points = 30
//! age_pie_top = 10
//! scatter_limit = 20
//! experience_labels = ["Low", "Medium", "High"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StatsError};
use crate::query::{DEFAULT_LIMIT, DEFAULT_MIN_POINTS};

pub const DEFAULT_CONFIG_FILE: &str = "seriea.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one `<entity>.parquet` file per table
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fallback for a missing or malformed `min_points` parameter
    #[serde(default = "default_min_points")]
    pub default_min_points: i64,

    /// Fallback for a missing or malformed `limit` parameter
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default)]
    pub charts: ChartSettings,
}

/// Parameters of the six dashboard charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSettings {
    #[serde(default = "default_teams_min_points")]
    pub teams_min_points: i64,

    /// Teams shown in the average age pie
    #[serde(default = "default_age_pie_top")]
    pub age_pie_top: usize,

    #[serde(default = "default_scatter_limit")]
    pub scatter_limit: usize,

    /// One label per experience bucket, lowest first
    #[serde(default = "default_experience_labels")]
    pub experience_labels: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_min_points() -> i64 {
    DEFAULT_MIN_POINTS
}
fn default_limit() -> usize {
    DEFAULT_LIMIT
}
fn default_teams_min_points() -> i64 {
    30
}
fn default_age_pie_top() -> usize {
    10
}
fn default_scatter_limit() -> usize {
    20
}
fn default_experience_labels() -> Vec<String> {
    vec!["Low".into(), "Medium".into(), "High".into()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_min_points: default_min_points(),
            default_limit: default_limit(),
            charts: ChartSettings::default(),
        }
    }
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            teams_min_points: default_teams_min_points(),
            age_pie_top: default_age_pie_top(),
            scatter_limit: default_scatter_limit(),
            experience_labels: default_experience_labels(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| StatsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StatsError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Read `path` when given, otherwise `seriea.toml` in the working
    /// directory if it exists, otherwise the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.charts.experience_labels.is_empty() {
            return Err(StatsError::Config("charts.experience_labels must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            default_limit = 5

            [charts]
            scatter_limit = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.default_limit, 5);
        assert_eq!(config.default_min_points, 50);
        assert_eq!(config.charts.scatter_limit, 50);
        assert_eq!(config.charts.experience_labels, vec!["Low", "Medium", "High"]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(Config::from_toml("default_limit = -1"), Err(StatsError::Config(_))));
        assert!(matches!(
            Config::from_toml("[charts]\nexperience_labels = []"),
            Err(StatsError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seriea.toml");
        std::fs::write(&path, "data_dir = \"/srv/seriea\"").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/seriea"));

        assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
    }
}
