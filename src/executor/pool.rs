//! Bounded worker pool
//!
//! One admission loop serves both pool drivers. It keeps at most `limit`
//! executions in flight, yields results in completion order, and turns a
//! worker that dies without producing a result into a crashed sentinel.

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{AbortHandle, Id, JoinSet};
use tracing::{debug, error};

use super::TestRunner;
use crate::models::{Context, TestCase, TestResult};
use crate::plugin::WorkerKind;
use crate::utils::panic::{catch, panic_message};

/// Lazy, sendable sequence of test cases
pub type CaseIter = Box<dyn Iterator<Item = Arc<TestCase>> + Send>;

/// Where an admitted test actually runs
pub trait ExecutionUnit: Send + Sync + 'static {
    fn kind(&self) -> WorkerKind;

    /// Start `test_case` on `set`; the task must resolve to its final result
    /// with `did_run` already delivered
    fn launch(&self, set: &mut JoinSet<TestResult>, test_case: Arc<TestCase>) -> AbortHandle;
}

/// Supervisor-side `will_clone`/`will_fork`; a panic crashes only the test
/// about to be launched
pub(super) fn will_spawn(runner: &TestRunner, kind: WorkerKind) -> anyhow::Result<()> {
    let hook = match kind {
        WorkerKind::Thread => "will_clone hook",
        WorkerKind::Process => "will_fork hook",
    };
    catch(hook, || {
        runner.plugins().will_spawn(kind);
        Ok(())
    })
}

/// Resolve `test_case` to a crashed result without starting a worker
pub(super) fn launch_crashed(
    set: &mut JoinSet<TestResult>,
    runner: Arc<TestRunner>,
    test_case: Arc<TestCase>,
    error: anyhow::Error,
) -> AbortHandle {
    error!(target: "qa::run", "cannot launch {}: {:#}", test_case, error);
    set.spawn(async move {
        let result = TestResult::crashed(&test_case, format!("{error:#}"));
        runner.notify_did_run(&test_case, &result, &Context::new());
        result
    })
}

/// In-process unit: one blocking worker thread per admitted test
pub struct ThreadUnit {
    runner: Arc<TestRunner>,
}

impl ThreadUnit {
    pub fn new(runner: Arc<TestRunner>) -> Self {
        Self { runner }
    }
}

impl ExecutionUnit for ThreadUnit {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Thread
    }

    fn launch(&self, set: &mut JoinSet<TestResult>, test_case: Arc<TestCase>) -> AbortHandle {
        let runner = self.runner.clone();
        if let Err(e) = will_spawn(&runner, WorkerKind::Thread) {
            return launch_crashed(set, runner, test_case, e);
        }
        set.spawn_blocking(move || {
            runner.plugins().did_spawn(WorkerKind::Thread);
            runner.run_admitted(&test_case)
        })
    }
}

struct PoolState<U> {
    cases: CaseIter,
    exhausted: bool,
    in_flight: JoinSet<TestResult>,
    admitted: HashMap<Id, (Arc<TestCase>, DateTime<Utc>)>,
    unit: Arc<U>,
    runner: Arc<TestRunner>,
    limit: usize,
}

impl<U: ExecutionUnit> PoolState<U> {
    async fn next_result(mut self) -> Option<(TestResult, Self)> {
        loop {
            if !self.exhausted && self.in_flight.len() < self.limit {
                match self.cases.next() {
                    Some(test_case) => {
                        if let Some(result) = self.runner.admit(&test_case) {
                            return Some((result, self));
                        }
                        debug!(target: "qa::run", "starting {}", test_case);
                        let launched_at = Utc::now();
                        let handle = self.unit.launch(&mut self.in_flight, test_case.clone());
                        self.admitted.insert(handle.id(), (test_case, launched_at));
                        continue;
                    }
                    None => self.exhausted = true,
                }
            }

            // Full, or no more cases: wait for the next completion
            let result = match self.in_flight.join_next_with_id().await? {
                Ok((id, result)) => {
                    self.admitted.remove(&id);
                    result
                }
                Err(join_error) => {
                    let id = join_error.id();
                    let reason = if join_error.is_panic() {
                        panic_message(join_error.into_panic().as_ref())
                    } else {
                        "worker task cancelled".to_string()
                    };
                    match self.admitted.remove(&id) {
                        Some((test_case, launched_at)) => {
                            error!(
                                target: "qa::run",
                                "{:?} worker for {} died: {}",
                                self.unit.kind(),
                                test_case,
                                reason
                            );
                            TestResult::crashed_since(
                                &test_case,
                                format!("worker died: {reason}"),
                                launched_at,
                            )
                        }
                        None => {
                            error!(target: "qa::run", "unknown worker task died: {}", reason);
                            continue;
                        }
                    }
                }
            };
            return Some((result, self));
        }
    }
}

/// Stream results from `cases` with at most `limit` executions in flight
pub fn bounded<U: ExecutionUnit>(
    cases: CaseIter,
    unit: Arc<U>,
    runner: Arc<TestRunner>,
    limit: usize,
) -> BoxStream<'static, TestResult> {
    let state = PoolState {
        cases,
        exhausted: false,
        in_flight: JoinSet::new(),
        admitted: HashMap::new(),
        unit,
        runner,
        limit: limit.max(1),
    };
    stream::unfold(state, PoolState::next_result).boxed()
}

/// Stream results one test at a time, in submission order
pub fn sequential(cases: CaseIter, runner: Arc<TestRunner>) -> BoxStream<'static, TestResult> {
    stream::iter(cases)
        .then(move |test_case| {
            let runner = runner.clone();
            async move {
                if let Some(result) = runner.admit(&test_case) {
                    return result;
                }
                let worker_case = test_case.clone();
                let worker = runner.clone();
                match tokio::task::spawn_blocking(move || worker.run_admitted(&worker_case)).await {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!(target: "qa::run", "worker for {} died: {}", test_case, join_error);
                        TestResult::crashed(&test_case, format!("worker died: {join_error}"))
                    }
                }
            }
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{testcase, Status, Tally};
    use crate::plugin::{Plugin, PluginSet, ShouldRun};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn boxed(cases: Vec<Arc<TestCase>>) -> CaseIter {
        Box::new(cases.into_iter())
    }

    fn sleeper(name: &str, millis: u64) -> Arc<TestCase> {
        Arc::new(
            testcase(name, move |_| {
                std::thread::sleep(Duration::from_millis(millis));
                Ok(())
            })
            .build(),
        )
    }

    #[tokio::test]
    async fn test_bound_never_exceeded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let cases: Vec<_> = (0..12)
            .map(|i| {
                let (running, peak) = (running.clone(), peak.clone());
                Arc::new(
                    testcase(format!("t{i}"), move |_| {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .build(),
                )
            })
            .collect();

        let runner = Arc::new(TestRunner::default());
        let unit = Arc::new(ThreadUnit::new(runner.clone()));
        let results: Vec<_> = bounded(boxed(cases), unit, runner, 3).collect().await;

        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| r.status() == Status::Ok));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_completion_order() {
        let cases = vec![sleeper("slow", 300), sleeper("fast", 1)];
        let runner = Arc::new(TestRunner::default());
        let unit = Arc::new(ThreadUnit::new(runner.clone()));
        let names: Vec<_> = bounded(boxed(cases), unit, runner, 2)
            .map(|r| r.name)
            .collect()
            .await;
        assert_eq!(names, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_skips_yield_before_pool_work() {
        struct SkipOdd;
        impl Plugin for SkipOdd {
            fn should_run(&self, test_case: &TestCase) -> ShouldRun {
                if test_case.name.ends_with(['1', '3']) {
                    ShouldRun::Skip(None)
                } else {
                    ShouldRun::Run
                }
            }
        }
        let cases = vec![
            sleeper("t0", 50),
            sleeper("t1", 0),
            sleeper("t2", 50),
            sleeper("t3", 0),
        ];
        let runner = Arc::new(TestRunner::new(PluginSet::new().with(Arc::new(SkipOdd))));
        let unit = Arc::new(ThreadUnit::new(runner.clone()));
        let results: Vec<_> = bounded(boxed(cases), unit, runner, 4).collect().await;

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(&names[..2], &["t1", "t3"]);
        let tally: Tally = results.iter().collect();
        assert_eq!(tally.skipped, 2);
        assert_eq!(tally.ok, 2);
    }

    #[tokio::test]
    async fn test_worker_death_yields_sentinel() {
        struct Explode;
        impl Plugin for Explode {
            fn did_clone(&self) {
                panic!("worker bootstrap failed");
            }
        }
        let runner = Arc::new(TestRunner::new(PluginSet::new().with(Arc::new(Explode))));
        let unit = Arc::new(ThreadUnit::new(runner.clone()));
        let cases = vec![sleeper("a", 0), sleeper("b", 0), sleeper("c", 0)];
        let results: Vec<_> = bounded(boxed(cases), unit, runner, 1).collect().await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.status(), Status::Crashed);
            assert!(result.formatted_message().contains("worker bootstrap failed"));
        }
    }

    #[tokio::test]
    async fn test_spawn_hook_panic_crashes_one_test() {
        #[derive(Default)]
        struct FirstCloneExplodes {
            clones: AtomicUsize,
            did_run: AtomicUsize,
        }
        impl Plugin for FirstCloneExplodes {
            fn will_clone(&self) {
                if self.clones.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("clone hook broken");
                }
            }
            fn did_run(&self, _test_case: &TestCase, _result: &TestResult, _ctx: &Context) {
                self.did_run.fetch_add(1, Ordering::SeqCst);
            }
        }
        let plugin = Arc::new(FirstCloneExplodes::default());
        let runner = Arc::new(TestRunner::new(PluginSet::new().with(plugin.clone())));
        let unit = Arc::new(ThreadUnit::new(runner.clone()));
        let cases = vec![sleeper("a", 0), sleeper("b", 0), sleeper("c", 0)];
        let results: Vec<_> = bounded(boxed(cases), unit, runner, 2).collect().await;

        assert_eq!(results.len(), 3);
        let crashed: Vec<_> = results
            .iter()
            .filter(|r| r.status() == Status::Crashed)
            .collect();
        assert_eq!(crashed.len(), 1);
        assert_eq!(crashed[0].name, "a");
        assert!(crashed[0]
            .formatted_message()
            .contains("will_clone hook panicked: clone hook broken"));
        let tally: Tally = results.iter().collect();
        assert_eq!(tally.ok, 2);
        assert_eq!(plugin.did_run.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sequential_preserves_order() {
        let cases = vec![sleeper("slow", 50), sleeper("fast", 0)];
        let runner = Arc::new(TestRunner::default());
        let names: Vec<_> = sequential(boxed(cases), runner)
            .map(|r| r.name)
            .collect()
            .await;
        assert_eq!(names, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let runner = Arc::new(TestRunner::default());
        let unit = Arc::new(ThreadUnit::new(runner.clone()));
        let results: Vec<_> = bounded(boxed(Vec::new()), unit, runner, 4).collect().await;
        assert!(results.is_empty());
    }
}
