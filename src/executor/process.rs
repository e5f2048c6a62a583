//! Out-of-process execution
//!
//! The supervisor re-executes the current program with the registry
//! position of the test in `QA_WORKER_INDEX`. The host program calls
//! [`serve_if_worker`] first thing; in a worker it runs that one test and
//! writes the result as a single `QA-RESULT:` JSON line on stdout.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error};

use super::pool::{launch_crashed, will_spawn, ExecutionUnit};
use super::TestRunner;
use crate::error::QaError;
use crate::models::{Context, TestCase, TestResult};
use crate::plugin::{PluginSet, WorkerKind};
use crate::registry::Registry;
use crate::utils::logger::{active_directives, ENV_WORKER_LOG};

pub const ENV_WORKER_INDEX: &str = "QA_WORKER_INDEX";
pub const ENV_WORKER_GROUP: &str = "QA_WORKER_GROUP";
pub const ENV_WORKER_NAME: &str = "QA_WORKER_NAME";
pub const RESULT_PREFIX: &str = "QA-RESULT:";

/// Stderr lines kept in a sentinel result
const STDERR_TAIL_LINES: usize = 20;

/// Unit that runs each admitted test in its own OS process
pub struct ProcessUnit {
    registry: Arc<Registry>,
    runner: Arc<TestRunner>,
    program: Result<PathBuf, String>,
}

impl ProcessUnit {
    /// Workers re-execute the current executable
    pub fn new(registry: Arc<Registry>, runner: Arc<TestRunner>) -> Self {
        let program = std::env::current_exe()
            .map_err(|e| format!("cannot locate worker executable: {e}"));
        Self {
            registry,
            runner,
            program,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Ok(program.into());
        self
    }
}

impl ExecutionUnit for ProcessUnit {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Process
    }

    fn launch(&self, set: &mut JoinSet<TestResult>, test_case: Arc<TestCase>) -> AbortHandle {
        let index = self.registry.position(&test_case);
        let program = self.program.clone();
        let runner = self.runner.clone();
        if let Err(e) = will_spawn(&runner, WorkerKind::Process) {
            return launch_crashed(set, runner, test_case, e);
        }
        let launched_at = Utc::now();

        set.spawn(async move {
            let result = match (index, program) {
                (None, _) => TestResult::crashed(
                    &test_case,
                    QaError::Unregistered(test_case.group_and_name()).to_string(),
                ),
                (Some(_), Err(message)) => TestResult::crashed(&test_case, message),
                (Some(index), Ok(program)) => {
                    run_worker(&program, index, &test_case, launched_at).await
                }
            };
            // The worker's context stays in the worker
            runner.notify_did_run(&test_case, &result, &Context::new());
            result
        })
    }
}

async fn run_worker(
    program: &Path,
    index: usize,
    test_case: &TestCase,
    launched_at: DateTime<Utc>,
) -> TestResult {
    debug!(target: "qa::run", "spawning worker process for {}", test_case);
    let mut command = Command::new(program);
    if let Some(directives) = active_directives() {
        command.env(ENV_WORKER_LOG, directives);
    }
    let output = command
        .env(ENV_WORKER_INDEX, index.to_string())
        .env(ENV_WORKER_GROUP, &test_case.group)
        .env(ENV_WORKER_NAME, &test_case.name)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            error!(target: "qa::run", "failed to spawn worker for {}: {}", test_case, e);
            return TestResult::crashed_since(
                test_case,
                format!("failed to spawn worker process: {e}"),
                launched_at,
            );
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    forward_output(&stdout, &stderr);

    match parse_result(&stdout) {
        Ok(Some(result)) => result,
        Ok(None) => {
            let tail = stderr_tail(&stderr);
            error!(
                target: "qa::run",
                "worker for {} exited ({}) without a result",
                test_case,
                output.status
            );
            TestResult::crashed_since(
                test_case,
                format!("worker process exited ({}) without a result\n{tail}", output.status),
                launched_at,
            )
        }
        Err(e) => TestResult::crashed_since(test_case, e.to_string(), launched_at),
    }
}

/// Pass through everything the worker printed except the result line
fn forward_output(stdout: &str, stderr: &str) {
    let mut out = std::io::stdout().lock();
    for line in stdout.lines().filter(|l| !l.starts_with(RESULT_PREFIX)) {
        let _ = writeln!(out, "{line}");
    }
    if !stderr.is_empty() {
        let _ = std::io::stderr().lock().write_all(stderr.as_bytes());
    }
}

/// Last result line in a worker's stdout, if any
pub fn parse_result(stdout: &str) -> Result<Option<TestResult>, QaError> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_PREFIX))
        .map(|json| {
            serde_json::from_str(json)
                .map_err(|e| QaError::WorkerProtocol(format!("unreadable result: {e}")))
        })
        .transpose()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Locate the test a worker process was spawned for
fn worker_case(registry: &Registry, index: &str) -> Result<Arc<TestCase>, QaError> {
    let index: usize = index
        .parse()
        .map_err(|_| QaError::WorkerProtocol(format!("bad {ENV_WORKER_INDEX}: {index:?}")))?;
    let test_case = registry
        .get(index)
        .ok_or_else(|| QaError::WorkerProtocol(format!("no test case at position {index}")))?;

    let group = std::env::var(ENV_WORKER_GROUP).unwrap_or_default();
    let name = std::env::var(ENV_WORKER_NAME).unwrap_or_default();
    if test_case.group != group || test_case.name != name {
        return Err(QaError::WorkerProtocol(format!(
            "registry mismatch: position {index} is {}, supervisor expected {group}:{name}",
            test_case.group_and_name()
        )));
    }
    Ok(test_case)
}

/// Whether this process was spawned as a worker
pub fn is_worker() -> bool {
    std::env::var_os(ENV_WORKER_INDEX).is_some()
}

/// Run as a worker if this process was spawned as one
///
/// Returns the exit code the process should terminate with, or `None` when
/// this is not a worker process. Must be called with the same registry
/// contents and plugins as the supervisor.
pub fn serve_if_worker(registry: &Registry, plugins: &PluginSet) -> Option<i32> {
    let index = std::env::var(ENV_WORKER_INDEX).ok()?;
    plugins.did_spawn(WorkerKind::Process);

    let result = match worker_case(registry, &index) {
        Ok(test_case) => {
            let runner = TestRunner::new(plugins.clone());
            let mut ctx = Context::new();
            runner.execute(&test_case, &mut ctx)
        }
        Err(e) => {
            eprintln!("qa worker: {e}");
            return Some(2);
        }
    };

    let line = match serde_json::to_string(&result) {
        Ok(json) => format!("{RESULT_PREFIX}{json}"),
        Err(e) => {
            eprintln!("qa worker: cannot encode result: {e}");
            return Some(2);
        }
    };
    let mut out = std::io::stdout().lock();
    if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
        return Some(2);
    }
    Some(0)
}
