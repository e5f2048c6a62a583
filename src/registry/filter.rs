//! Name filtering
//!
//! Selects test cases whose `group:name` identifier matches any of a set of
//! regular expressions.

use regex::Regex;

use crate::error::{QaError, QaResult};
use crate::models::TestCase;

/// Compiled name filter; with no patterns every test passes
#[derive(Clone, Debug, Default)]
pub struct NameFilter {
    patterns: Vec<Regex>,
}

impl NameFilter {
    pub fn new<I, S>(patterns: I) -> QaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).map_err(|source| QaError::InvalidFilter {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<QaResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn accept_all() -> Self {
        Self::default()
    }

    /// True when any pattern is found anywhere in `identifier`
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_match(identifier))
    }

    pub fn matches(&self, test_case: &TestCase) -> bool {
        self.matches_identifier(&test_case.group_and_name())
    }
}
