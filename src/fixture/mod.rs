//! Fixtures (requirements)
//!
//! A requirement performs setup on a test's [`Context`] before the body runs
//! and teardown afterwards. Requirements for one execution are entered in
//! order onto a [`FixtureStack`] and released in reverse, whatever the body
//! did.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::Context;
use crate::utils::panic::catch;

/// Scoped setup/teardown pair bound to a test context
pub trait Requirement: Send + Sync {
    fn name(&self) -> &str;

    fn setup(&self, ctx: &mut Context) -> anyhow::Result<()>;

    fn teardown(&self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }
}

type Hook = Box<dyn Fn(&mut Context) -> anyhow::Result<()> + Send + Sync>;

/// Requirement built from a pair of closures
///
/// ```
/// use qa::{Context, Fixture};
///
/// let user = Fixture::new(
///     "user",
///     |ctx: &mut Context| {
///         ctx.insert("user", "alice".to_string());
///         Ok(())
///     },
///     |ctx: &mut Context| {
///         ctx.discard("user");
///         Ok(())
///     },
/// )
/// .shared();
/// let case = qa::testcase("has_user", |ctx| Ok(qa::expect(&ctx.contains("user"))?))
///     .require(user)
///     .build();
/// assert_eq!(case.requires.len(), 1);
/// ```
pub struct Fixture {
    name: String,
    setup: Hook,
    teardown: Hook,
}

impl Fixture {
    pub fn new<S, T>(name: impl Into<String>, setup: S, teardown: T) -> Self
    where
        S: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
        T: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            setup: Box::new(setup),
            teardown: Box::new(teardown),
        }
    }

    /// Setup only; teardown does nothing
    pub fn setup_only<S>(name: impl Into<String>, setup: S) -> Self
    where
        S: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(name, setup, |_| Ok(()))
    }

    pub fn shared(self) -> Arc<dyn Requirement> {
        Arc::new(self)
    }
}

impl Requirement for Fixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.setup)(ctx)
    }

    fn teardown(&self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.teardown)(ctx)
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture").field("name", &self.name).finish()
    }
}

/// Stack of entered requirements for one execution
#[derive(Default)]
pub struct FixtureStack {
    entered: Vec<Arc<dyn Requirement>>,
}

impl FixtureStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run setup for `requirement` and push it on success
    ///
    /// A requirement whose setup fails is not pushed, so its teardown
    /// never runs.
    pub fn enter(&mut self, requirement: Arc<dyn Requirement>, ctx: &mut Context) -> anyhow::Result<()> {
        debug!(target: "qa::run", "setting up requirement {}", requirement.name());
        catch("requirement setup", || requirement.setup(ctx))
            .map_err(|e| e.context(format!("setup of requirement {:?} failed", requirement.name())))?;
        self.entered.push(requirement);
        Ok(())
    }

    /// Enter requirements in order, stopping at the first failed setup
    pub fn enter_all(
        &mut self,
        requirements: impl IntoIterator<Item = Arc<dyn Requirement>>,
        ctx: &mut Context,
    ) -> anyhow::Result<()> {
        for requirement in requirements {
            self.enter(requirement, ctx)?;
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.entered.len()
    }

    /// Tear down every entered requirement, last entered first
    ///
    /// Every teardown runs even if earlier ones fail; the errors are
    /// returned in the order they occurred.
    pub fn unwind(&mut self, ctx: &mut Context) -> Vec<anyhow::Error> {
        let mut errors = Vec::new();
        while let Some(requirement) = self.entered.pop() {
            debug!(target: "qa::run", "tearing down requirement {}", requirement.name());
            if let Err(e) = catch("requirement teardown", || requirement.teardown(ctx)) {
                let e = e.context(format!("teardown of requirement {:?} failed", requirement.name()));
                error!(target: "qa::run", "{e:#}");
                errors.push(e);
            }
        }
        errors
    }
}

impl Drop for FixtureStack {
    fn drop(&mut self) {
        if !self.entered.is_empty() {
            error!(
                target: "qa::run",
                "fixture stack dropped with {} requirement(s) still entered",
                self.entered.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Requirement> {
        let setup_log = log.clone();
        Fixture::new(
            name,
            move |_| {
                setup_log.lock().unwrap().push(format!("setup {name}"));
                Ok(())
            },
            move |_| {
                log.lock().unwrap().push(format!("teardown {name}"));
                Ok(())
            },
        )
        .shared()
    }

    #[test]
    fn test_unwind_reverses_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = Context::new();
        let mut stack = FixtureStack::new();
        stack
            .enter_all(
                vec![
                    recording("a", log.clone()),
                    recording("b", log.clone()),
                    recording("c", log.clone()),
                ],
                &mut ctx,
            )
            .unwrap();
        assert_eq!(stack.depth(), 3);
        assert!(stack.unwind(&mut ctx).is_empty());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "setup a",
                "setup b",
                "setup c",
                "teardown c",
                "teardown b",
                "teardown a"
            ]
        );
    }

    #[test]
    fn test_failed_setup_stops_and_is_not_torn_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broken = Fixture::new(
            "broken",
            |_| anyhow::bail!("no database"),
            |_| panic!("must not run"),
        )
        .shared();

        let mut ctx = Context::new();
        let mut stack = FixtureStack::new();
        let err = stack
            .enter_all(
                vec![recording("a", log.clone()), broken, recording("c", log.clone())],
                &mut ctx,
            )
            .unwrap_err();
        assert!(format!("{err:#}").contains("no database"));
        assert_eq!(stack.depth(), 1);

        stack.unwind(&mut ctx);
        assert_eq!(*log.lock().unwrap(), vec!["setup a", "teardown a"]);
    }

    #[test]
    fn test_teardown_errors_collected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let panicky = Fixture::new("panicky", |_| Ok(()), |_| panic!("teardown blew up")).shared();

        let mut ctx = Context::new();
        let mut stack = FixtureStack::new();
        stack
            .enter_all(vec![recording("a", log.clone()), panicky], &mut ctx)
            .unwrap();
        let errors = stack.unwind(&mut ctx);
        assert_eq!(errors.len(), 1);
        assert!(format!("{:#}", errors[0]).contains("teardown blew up"));
        // The earlier requirement is still released
        assert_eq!(*log.lock().unwrap(), vec!["setup a", "teardown a"]);
    }

    #[test]
    fn test_fixture_writes_context() {
        let fixture = Fixture::new(
            "foo",
            |ctx| {
                ctx.insert("foo", 1);
                Ok(())
            },
            |ctx| {
                ctx.discard("foo");
                Ok(())
            },
        )
        .shared();
        let mut ctx = Context::new();
        let mut stack = FixtureStack::new();
        stack.enter(fixture, &mut ctx).unwrap();
        assert_eq!(ctx.get::<i32>("foo"), Some(&1));
        stack.unwind(&mut ctx);
        assert!(!ctx.contains("foo"));
    }
}
