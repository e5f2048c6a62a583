//! Test case descriptors
//!
//! A `TestCase` couples a test body with its metadata and requirements.
//! Descriptors are immutable once built; the registry shares them as
//! `Arc<TestCase>`.

use std::fmt;
use std::sync::Arc;

use super::Context;
use crate::fixture::Requirement;
use crate::registry::Registry;

/// Test body: a single-argument function over the execution context
pub type TestBody = Arc<dyn Fn(&mut Context) -> anyhow::Result<()> + Send + Sync>;

/// Immutable test descriptor
#[derive(Clone)]
pub struct TestCase {
    /// Logical namespace, usually the defining module path
    pub group: String,
    pub name: String,
    pub requires: Vec<Arc<dyn Requirement>>,
    pub description: Option<String>,
    pub skip: bool,
    pub skip_reason: String,
    body: TestBody,
}

impl TestCase {
    /// Identifier used by name filters and reports: `group:name`
    pub fn group_and_name(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    pub fn body(&self) -> &TestBody {
        &self.body
    }

    /// Run the body directly, with no fixtures, plugins or capture
    pub fn call(&self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.body)(ctx)
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group
            && self.name == other.name
            && self.description == other.description
            && Arc::ptr_eq(&self.body, &other.body)
            && self.requires.len() == other.requires.len()
            && self
                .requires
                .iter()
                .zip(&other.requires)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for TestCase {}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("group", &self.group)
            .field("name", &self.name)
            .field(
                "requires",
                &self.requires.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("description", &self.description)
            .field("skip", &self.skip)
            .finish()
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Start building a test case
///
/// ```
/// let case = qa::testcase("adds", |_ctx| qa::expect_eq(&(1 + 1), &2).map_err(Into::into))
///     .group("math")
///     .build();
/// assert_eq!(case.group_and_name(), "math:adds");
/// ```
pub fn testcase<F>(name: impl Into<String>, body: F) -> TestCaseBuilder
where
    F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
{
    TestCaseBuilder::new(name, Arc::new(body))
}

/// Build a test case whose group defaults to the calling module's path
#[macro_export]
macro_rules! test_case {
    ($name:expr, $body:expr $(,)?) => {
        $crate::testcase($name, $body).group(module_path!())
    };
}

/// Builder for [`TestCase`]
pub struct TestCaseBuilder {
    case: TestCase,
}

impl TestCaseBuilder {
    pub fn new(name: impl Into<String>, body: TestBody) -> Self {
        Self {
            case: TestCase {
                group: String::new(),
                name: name.into(),
                requires: Vec::new(),
                description: None,
                skip: false,
                skip_reason: String::new(),
                body,
            },
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.case.group = group.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.case.description = Some(description.into());
        self
    }

    /// Append one requirement; requirements are entered in the order added
    pub fn require(mut self, requirement: Arc<dyn Requirement>) -> Self {
        self.case.requires.push(requirement);
        self
    }

    pub fn requires(mut self, requirements: impl IntoIterator<Item = Arc<dyn Requirement>>) -> Self {
        self.case.requires.extend(requirements);
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.case.skip = true;
        self.case.skip_reason = reason.into();
        self
    }

    pub fn build(self) -> TestCase {
        self.case
    }

    /// Build and append to `registry`, returning the shared descriptor
    pub fn register(self, registry: &Registry) -> Arc<TestCase> {
        registry.register(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let case = testcase("plain", |_| Ok(())).build();
        assert_eq!(case.group, "");
        assert_eq!(case.group_and_name(), ":plain");
        assert!(!case.skip);
        assert!(case.requires.is_empty());
    }

    #[test]
    fn test_macro_uses_module_path() {
        let case = test_case!("named", |_| Ok(())).build();
        assert_eq!(case.group, module_path!());
    }

    #[test]
    fn test_structural_identity() {
        let body: TestBody = Arc::new(|_| Ok(()));
        let a = TestCaseBuilder::new("a", body.clone()).group("g").build();
        let b = TestCaseBuilder::new("a", body).group("g").build();
        assert_eq!(a, b);

        let c = testcase("a", |_| Ok(())).group("g").build();
        assert_ne!(a, c);
    }

    #[test]
    fn test_identity_ignores_skip_flags() {
        let body: TestBody = Arc::new(|_| Ok(()));
        let a = TestCaseBuilder::new("a", body.clone()).group("g").build();
        let b = TestCaseBuilder::new("a", body.clone())
            .group("g")
            .skip("later")
            .build();
        assert_eq!(a, b);

        let described = TestCaseBuilder::new("a", body)
            .group("g")
            .description("other")
            .build();
        assert_ne!(a, described);
    }

    #[test]
    fn test_call_runs_body() {
        let case = testcase("writes", |ctx| {
            ctx.insert("ran", true);
            Ok(())
        })
        .build();
        let mut ctx = Context::new();
        case.call(&mut ctx).unwrap();
        assert_eq!(ctx.get::<bool>("ran"), Some(&true));
    }
}
