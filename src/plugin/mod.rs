//! Plugin protocol
//!
//! Plugins observe and steer test execution at fixed lifecycle points. Every
//! hook has a default, so a plugin implements only what it needs. Plugins
//! are shared across all executions of a run and may be called from several
//! worker threads at once.

use std::sync::Arc;
use tracing::{debug, error};

use crate::fixture::Requirement;
use crate::models::{Context, TestCase, TestResult};

/// Skip decision returned by [`Plugin::should_run`]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ShouldRun {
    #[default]
    Run,
    Skip(Option<String>),
}

impl ShouldRun {
    pub fn skip(reason: impl Into<String>) -> Self {
        ShouldRun::Skip(Some(reason.into()))
    }
}

impl From<bool> for ShouldRun {
    fn from(run: bool) -> Self {
        if run {
            ShouldRun::Run
        } else {
            ShouldRun::Skip(None)
        }
    }
}

/// Kind of worker a lifecycle hook concerns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerKind {
    Thread,
    Process,
}

/// Capability set consulted by the engine
pub trait Plugin: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Decide whether `test_case` runs at all
    fn should_run(&self, _test_case: &TestCase) -> ShouldRun {
        ShouldRun::Run
    }

    /// Requirements entered ahead of the test's own
    fn extra_requirements(&self, _test_case: &TestCase) -> Vec<Arc<dyn Requirement>> {
        Vec::new()
    }

    /// Called after setup, right before the body runs
    fn will_run(&self, _test_case: &TestCase, _ctx: &mut Context) {}

    /// Called once per executed test, after teardown and finalization
    ///
    /// Under the process driver this runs in the supervisor with an empty
    /// context; the worker's context does not cross the process boundary.
    fn did_run(&self, _test_case: &TestCase, _result: &TestResult, _ctx: &Context) {}

    /// Called once per skipped test
    fn did_skip(&self, _test_case: &TestCase, _result: &TestResult) {}

    /// Supervisor side, before a worker process is spawned
    fn will_fork(&self) {}

    /// Worker side, at the start of a worker process
    fn did_fork(&self) {}

    /// Supervisor side, before a worker thread is spawned
    fn will_clone(&self) {}

    /// Worker side, at the start of a worker thread
    fn did_clone(&self) {}
}

/// Ordered, deduplicated set of plugins
#[derive(Clone, Default)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin; registering the same instance twice is an error that
    /// is logged and otherwise ignored
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        if self.plugins.iter().any(|p| Arc::ptr_eq(p, &plugin)) {
            error!(target: "qa::register", "plugin {} already registered", plugin.name());
            return false;
        }
        debug!(target: "qa::register", "adding plugin {}", plugin.name());
        self.plugins.push(plugin);
        true
    }

    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// First plugin that declines `test_case` wins
    pub fn should_run(&self, test_case: &TestCase) -> ShouldRun {
        for plugin in &self.plugins {
            if let ShouldRun::Skip(reason) = plugin.should_run(test_case) {
                debug!(
                    target: "qa::run",
                    "plugin {} skipped {}",
                    plugin.name(),
                    test_case
                );
                return ShouldRun::Skip(reason);
            }
        }
        ShouldRun::Run
    }

    pub fn extra_requirements(&self, test_case: &TestCase) -> Vec<Arc<dyn Requirement>> {
        self.plugins
            .iter()
            .flat_map(|p| p.extra_requirements(test_case))
            .collect()
    }

    pub fn will_run(&self, test_case: &TestCase, ctx: &mut Context) {
        for plugin in &self.plugins {
            plugin.will_run(test_case, ctx);
        }
    }

    pub fn did_run(&self, test_case: &TestCase, result: &TestResult, ctx: &Context) {
        for plugin in &self.plugins {
            plugin.did_run(test_case, result, ctx);
        }
    }

    pub fn did_skip(&self, test_case: &TestCase, result: &TestResult) {
        for plugin in &self.plugins {
            plugin.did_skip(test_case, result);
        }
    }

    pub fn will_spawn(&self, kind: WorkerKind) {
        for plugin in &self.plugins {
            match kind {
                WorkerKind::Thread => plugin.will_clone(),
                WorkerKind::Process => plugin.will_fork(),
            }
        }
    }

    pub fn did_spawn(&self, kind: WorkerKind) {
        for plugin in &self.plugins {
            match kind {
                WorkerKind::Thread => plugin.did_clone(),
                WorkerKind::Process => plugin.did_fork(),
            }
        }
    }
}

impl FromIterator<Arc<dyn Plugin>> for PluginSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Plugin>>>(iter: I) -> Self {
        let mut set = PluginSet::new();
        for plugin in iter {
            set.register(plugin);
        }
        set
    }
}
