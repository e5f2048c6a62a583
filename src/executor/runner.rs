//! Per-test execution
//!
//! `TestRunner` drives one test case through skip decision, setup, body,
//! teardown and notification. Every driver funnels through it.

use std::sync::Arc;
use tracing::{debug, error};

use crate::expect::Failure;
use crate::fixture::FixtureStack;
use crate::models::{Context, Payload, TestCase, TestResult};
use crate::plugin::{PluginSet, ShouldRun};
use crate::utils::panic::catch;

/// How the body (or what ran in its place) ended
enum Outcome {
    Passed,
    Failed(anyhow::Error),
    Crashed(anyhow::Error),
}

fn is_failure(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<Failure>())
}

/// Runs single test cases against a plugin set
#[derive(Clone, Default)]
pub struct TestRunner {
    plugins: PluginSet,
}

impl TestRunner {
    pub fn new(plugins: PluginSet) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Resolve the skip decision for `test_case`
    ///
    /// Returns the final result when the test must not run: skipped by its
    /// own flag or by a plugin, or crashed because a plugin's `should_run`
    /// panicked. `None` means the test is admitted.
    pub fn admit(&self, test_case: &TestCase) -> Option<TestResult> {
        let decision = if test_case.skip {
            ShouldRun::Skip(Some(test_case.skip_reason.clone()))
        } else {
            match catch("should_run hook", || Ok(self.plugins.should_run(test_case))) {
                Ok(decision) => decision,
                Err(e) => {
                    error!(target: "qa::run", "skip decision for {} failed: {:#}", test_case, e);
                    let mut result = TestResult::start(test_case);
                    result.set_error(Payload::from_error(e));
                    result.finish();
                    return Some(result);
                }
            }
        };

        match decision {
            ShouldRun::Run => None,
            ShouldRun::Skip(reason) => {
                let result = TestResult::skip(test_case, reason.unwrap_or_default());
                debug!(target: "qa::run", "test skipped: {}", test_case);
                if let Err(e) = catch("did_skip hook", || {
                    self.plugins.did_skip(test_case, &result);
                    Ok(())
                }) {
                    error!(target: "qa::run", "{:#}", e);
                }
                Some(result)
            }
        }
    }

    /// Full state machine for one test in the current thread
    pub fn run_test(&self, test_case: &TestCase) -> TestResult {
        match self.admit(test_case) {
            Some(result) => result,
            None => self.run_admitted(test_case),
        }
    }

    /// Execute an admitted test and notify `did_run`
    pub fn run_admitted(&self, test_case: &TestCase) -> TestResult {
        let mut ctx = Context::new();
        let result = self.execute(test_case, &mut ctx);
        self.notify_did_run(test_case, &result, &ctx);
        result
    }

    /// Setup, `will_run`, body and teardown; no `did_run`
    pub fn execute(&self, test_case: &TestCase, ctx: &mut Context) -> TestResult {
        let mut result = TestResult::start(test_case);
        debug!(target: "qa::run", "starting {}", test_case);

        let mut stack = FixtureStack::new();
        let outcome = match self.set_up(test_case, &mut stack, ctx) {
            Err(e) => Outcome::Crashed(e),
            Ok(()) => self.run_body(test_case, ctx),
        };
        let teardown_errors = stack.unwind(ctx);

        match outcome {
            Outcome::Passed => {}
            Outcome::Failed(e) => result.set_failure(Payload::from_error(e)),
            Outcome::Crashed(e) => result.set_error(Payload::from_error(e)),
        }
        Self::record_teardown_errors(&mut result, teardown_errors);

        result.finish();
        debug!(
            target: "qa::run",
            "test {}: {}",
            result.status(),
            result.group_and_name()
        );
        result
    }

    fn set_up(
        &self,
        test_case: &TestCase,
        stack: &mut FixtureStack,
        ctx: &mut Context,
    ) -> anyhow::Result<()> {
        let extra = catch("extra_requirements hook", || {
            Ok(self.plugins.extra_requirements(test_case))
        })?;
        let requirements = extra
            .into_iter()
            .chain(test_case.requires.iter().map(Arc::clone));
        stack.enter_all(requirements, ctx)
    }

    fn run_body(&self, test_case: &TestCase, ctx: &mut Context) -> Outcome {
        if let Err(e) = catch("will_run hook", || {
            self.plugins.will_run(test_case, ctx);
            Ok(())
        }) {
            return Outcome::Crashed(e);
        }

        match catch("test body", || test_case.call(ctx)) {
            Ok(()) => Outcome::Passed,
            Err(e) if is_failure(&e) => Outcome::Failed(e),
            Err(e) => Outcome::Crashed(e),
        }
    }

    /// The body's outcome wins; teardown errors are appended to its payload,
    /// or become the crash payload when the body passed
    fn record_teardown_errors(result: &mut TestResult, errors: Vec<anyhow::Error>) {
        let mut errors = errors.into_iter();
        let existing = match (result.error.as_mut(), result.failure.as_mut()) {
            (Some(payload), _) | (None, Some(payload)) => Some(payload),
            (None, None) => None,
        };
        match existing {
            Some(payload) => {
                for e in errors {
                    payload.append_note(format!("during teardown: {e:#}"));
                }
            }
            None => {
                if let Some(first) = errors.next() {
                    let mut payload = Payload::from_error(first);
                    for e in errors {
                        payload.append_note(format!("during teardown: {e:#}"));
                    }
                    result.set_error(payload);
                }
            }
        }
    }

    pub fn notify_did_run(&self, test_case: &TestCase, result: &TestResult, ctx: &Context) {
        if let Err(e) = catch("did_run hook", || {
            self.plugins.did_run(test_case, result, ctx);
            Ok(())
        }) {
            error!(target: "qa::run", "{:#}", e);
        }
    }
}
