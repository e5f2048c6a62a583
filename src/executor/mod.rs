//! Test execution engine
//!
//! Turns a lazy sequence of test cases into a stream of results under one of
//! three concurrency modes: sequential, a worker-thread pool or a
//! worker-process pool.

mod pool;
mod process;
mod runner;

pub use pool::{bounded, sequential, CaseIter, ExecutionUnit, ThreadUnit};
pub use process::{is_worker, parse_result, serve_if_worker, ProcessUnit, RESULT_PREFIX};
pub use runner::TestRunner;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::QaError;
use crate::models::{TestCase, TestResult};
use crate::plugin::PluginSet;
use crate::registry::{NameFilter, Registry};

pub const DEFAULT_NUM_WORKERS: usize = 10;

/// Concurrency model for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    #[default]
    Single,
    Thread,
    Process,
}

impl ConcurrencyMode {
    pub fn all() -> [ConcurrencyMode; 3] {
        [
            ConcurrencyMode::Single,
            ConcurrencyMode::Thread,
            ConcurrencyMode::Process,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::Single => "single",
            ConcurrencyMode::Thread => "thread",
            ConcurrencyMode::Process => "process",
        }
    }
}

impl FromStr for ConcurrencyMode {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ConcurrencyMode::Single),
            "thread" => Ok(ConcurrencyMode::Thread),
            "process" => Ok(ConcurrencyMode::Process),
            _ => Err(QaError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run entry point: registry, plugins, mode, worker count and name filter
pub struct Engine {
    registry: Arc<Registry>,
    plugins: PluginSet,
    mode: ConcurrencyMode,
    num_workers: usize,
    filter: NameFilter,
    worker_program: Option<PathBuf>,
}

impl Engine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            plugins: PluginSet::new(),
            mode: ConcurrencyMode::Single,
            num_workers: DEFAULT_NUM_WORKERS,
            filter: NameFilter::accept_all(),
            worker_program: None,
        }
    }

    pub fn with_plugins(mut self, plugins: PluginSet) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Pool size; zero is treated as one
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Executable re-run for process workers, instead of the current one
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Run every registered test that passes the filter
    pub fn run(&self) -> BoxStream<'static, TestResult> {
        self.run_cases(self.registry.all_test_cases())
    }

    /// Run `cases` that pass the filter
    ///
    /// Results arrive in completion order under the pool modes. Under the
    /// process mode only cases present in the registry can run; others
    /// yield crashed results.
    pub fn run_cases<I>(&self, cases: I) -> BoxStream<'static, TestResult>
    where
        I: IntoIterator<Item = Arc<TestCase>>,
        I::IntoIter: Send + 'static,
    {
        let filter = self.filter.clone();
        let cases: CaseIter = Box::new(cases.into_iter().filter(move |c| filter.matches(c)));
        let runner = Arc::new(TestRunner::new(self.plugins.clone()));

        debug!(
            target: "qa::run",
            "executing tests in {} mode ({} workers)",
            self.mode,
            self.num_workers
        );
        match self.mode {
            ConcurrencyMode::Single => sequential(cases, runner),
            ConcurrencyMode::Thread => {
                let unit = Arc::new(ThreadUnit::new(runner.clone()));
                bounded(cases, unit, runner, self.num_workers)
            }
            ConcurrencyMode::Process => {
                let mut unit = ProcessUnit::new(self.registry.clone(), runner.clone());
                if let Some(program) = &self.worker_program {
                    unit = unit.with_program(program.clone());
                }
                bounded(cases, Arc::new(unit), runner, self.num_workers)
            }
        }
    }
}
