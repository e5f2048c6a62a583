//! Test registry
//!
//! An append-only, ordered collection of test descriptors. Hosts usually
//! register into [`Registry::global`]; engine tests build isolated
//! registries with [`Registry::new`].

mod filter;

pub use filter::NameFilter;

use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

use crate::models::TestCase;

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Ordered collection of registered test cases
#[derive(Debug, Default)]
pub struct Registry {
    cases: RwLock<Vec<Arc<TestCase>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, created on first use
    pub fn global() -> Arc<Registry> {
        GLOBAL.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Append `test_case`; duplicates are kept and will run twice
    pub fn register(&self, test_case: TestCase) -> Arc<TestCase> {
        debug!(target: "qa::register", "registering test case: {:?}", test_case);
        let test_case = Arc::new(test_case);
        self.cases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(test_case.clone());
        test_case
    }

    /// Snapshot of all registered cases in registration order
    pub fn all_test_cases(&self) -> Vec<Arc<TestCase>> {
        self.cases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registration position of this exact descriptor
    pub fn position(&self, test_case: &Arc<TestCase>) -> Option<usize> {
        self.cases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(|c| Arc::ptr_eq(c, test_case))
    }

    pub fn get(&self, index: usize) -> Option<Arc<TestCase>> {
        self.cases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.cases.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testcase;

    #[test]
    fn test_registration_order_and_duplicates() {
        let registry = Registry::new();
        let first = testcase("first", |_| Ok(())).register(&registry);
        let second = testcase("second", |_| Ok(())).register(&registry);
        let again = registry.register((*first).clone());

        let all = registry.all_test_cases();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "first"]);
        assert_eq!(*all[2], *first);

        assert_eq!(registry.position(&second), Some(1));
        assert_eq!(registry.position(&again), Some(2));
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let registry = Registry::new();
        let snapshot = registry.all_test_cases();
        testcase("late", |_| Ok(())).register(&registry);
        assert!(snapshot.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&Registry::global(), &Registry::global()));
    }
}
