//! Configuration module
//!
//! Run settings layered as defaults, then an optional config file, then
//! environment variables, then command-line flags.

mod env;

pub use env::EnvConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QaError, QaResult};
use crate::executor::{ConcurrencyMode, DEFAULT_NUM_WORKERS};
use crate::registry::NameFilter;

/// Config file locations searched when none is given (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &["./qa.yaml", "./qa.yml", "./qa.json", "~/.config/qa/config.yaml"];

/// Run configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Concurrency mode
    pub mode: ConcurrencyMode,

    /// Pool size for the thread and process modes
    pub num_workers: usize,

    /// Name filter patterns (regular expressions over `group:name`)
    pub filters: Vec<String>,

    /// Log level for the crate
    pub log_level: String,

    /// Output format (log, table, json, summary)
    pub format: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::Single,
            num_workers: DEFAULT_NUM_WORKERS,
            filters: Vec::new(),
            log_level: "warn".to_string(),
            format: "log".to_string(),
        }
    }
}

impl RunConfig {
    /// Find a configuration file in the standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> QaResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| QaError::ConfigIo {
            path: display.clone(),
            source,
        })?;

        let parsed = if is_yaml_file(path) {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };
        let config: Self = parsed.map_err(|message| QaError::ConfigParse {
            path: display,
            message,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults, overlaid with the config file and the environment
    pub fn resolve(explicit_path: Option<&Path>, env: &EnvConfig) -> QaResult<Self> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| env.config_file.as_ref().map(PathBuf::from))
            .or_else(Self::find);
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &EnvConfig) -> QaResult<()> {
        if let Some(mode) = &env.mode {
            self.mode = mode.parse()?;
        }
        if let Some(workers) = env.num_workers {
            self.num_workers = workers;
        }
        if let Some(filters) = &env.filters {
            self.filters = filters.clone();
        }
        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
        if let Some(format) = &env.format {
            self.format = format.clone();
        }
        Ok(())
    }

    /// Check that every filter pattern compiles
    pub fn validate(&self) -> QaResult<()> {
        self.name_filter().map(|_| ())
    }

    pub fn workers(&self) -> usize {
        self.num_workers.max(1)
    }

    pub fn name_filter(&self) -> QaResult<NameFilter> {
        NameFilter::new(&self.filters)
    }
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

/// Expand a leading `~/` to the home directory
fn expand_path(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.mode, ConcurrencyMode::Single);
        assert_eq!(config.num_workers, 10);
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_load_yaml_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa.yaml");
        std::fs::write(&path, "mode: thread\nnum_workers: 4\nfilters: [\"^db:\"]\n").unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(
            config,
            RunConfig {
                mode: ConcurrencyMode::Thread,
                num_workers: 4,
                filters: vec!["^db:".to_string()],
                ..RunConfig::default()
            }
        );
    }

    #[test]
    fn test_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa.json");
        std::fs::write(&path, r#"{"mode": "process", "format": "table"}"#).unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.mode, ConcurrencyMode::Process);
        assert_eq!(config.format, "table");
    }

    #[test]
    fn test_load_rejects_bad_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa.yaml");
        std::fs::write(&path, "filters: [\"(\"]\n").unwrap();
        assert!(matches!(
            RunConfig::load(&path),
            Err(QaError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RunConfig::load("/nonexistent/qa.yaml"),
            Err(QaError::ConfigIo { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qa.yaml");
        std::fs::write(&path, "mode: thread\nnum_workers: 4\n").unwrap();

        let env = EnvConfig {
            num_workers: Some(2),
            filters: Some(vec!["smoke".to_string()]),
            ..EnvConfig::default()
        };
        let config = RunConfig::resolve(Some(&path), &env).unwrap();
        assert_eq!(config.mode, ConcurrencyMode::Thread);
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.filters, vec!["smoke"]);
    }

    #[test]
    fn test_env_bad_mode() {
        let env = EnvConfig {
            mode: Some("grid".to_string()),
            ..EnvConfig::default()
        };
        let mut config = RunConfig::default();
        assert!(matches!(
            config.apply_env(&env),
            Err(QaError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_workers_clamped() {
        let config = RunConfig {
            num_workers: 0,
            ..RunConfig::default()
        };
        assert_eq!(config.workers(), 1);
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("./qa.yaml"), PathBuf::from("./qa.yaml"));
    }
}
