//! Environment variable configuration
//!
//! Provides environment variable overrides for run configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "QA";

/// Configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Concurrency mode from QA_MODE
    pub mode: Option<String>,
    /// Worker count from QA_WORKERS
    pub num_workers: Option<usize>,
    /// Comma-separated filter patterns from QA_FILTER
    pub filters: Option<Vec<String>>,
    /// Log level from QA_LOG
    pub log_level: Option<String>,
    /// Output format from QA_FORMAT
    pub format: Option<String>,
    /// Config file from QA_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which receives full variable names
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.is_empty());
        Self {
            mode: get("MODE"),
            num_workers: get("WORKERS").and_then(|v| v.parse().ok()),
            filters: get("FILTER").map(|v| split_list(&v)),
            log_level: get("LOG"),
            format: get("FORMAT"),
            config_file: get("CONFIG"),
        }
    }

    /// Check if any variables are set
    pub fn has_any(&self) -> bool {
        self != &Self::default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let env = EnvConfig::from_lookup(lookup(&[
            ("QA_MODE", "process"),
            ("QA_WORKERS", "3"),
            ("QA_FILTER", "db:, ^web:login ,"),
        ]));
        assert_eq!(env.mode.as_deref(), Some("process"));
        assert_eq!(env.num_workers, Some(3));
        assert_eq!(
            env.filters,
            Some(vec!["db:".to_string(), "^web:login".to_string()])
        );
        assert!(env.has_any());
    }

    #[test]
    fn test_unparseable_and_empty_ignored() {
        let env = EnvConfig::from_lookup(lookup(&[("QA_WORKERS", "many"), ("QA_LOG", "")]));
        assert_eq!(env.num_workers, None);
        assert_eq!(env.log_level, None);
        assert!(!env.has_any());
    }
}
