//! Test result models
//!
//! Defines the outcome of one test execution and its derived status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::TestCase;

/// Derived execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
    Crashed,
    Skipped,
}

impl Status {
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Ok => "✓",
            Status::Failed => "✗",
            Status::Crashed => "!",
            Status::Skipped => "○",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Failed => "failed",
            Status::Crashed => "crashed",
            Status::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured error or failure
///
/// `message` is formatted at capture time and is the only part that
/// survives serialization; `source` keeps the live error within one process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Payload {
    pub message: String,
    #[serde(skip)]
    pub source: Option<Arc<anyhow::Error>>,
}

impl Payload {
    pub fn from_error(error: anyhow::Error) -> Self {
        Self {
            message: format!("{error:?}"),
            source: Some(Arc::new(error)),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Append a secondary diagnostic, e.g. a teardown error
    pub fn append_note(&mut self, note: impl AsRef<str>) {
        if !self.message.is_empty() {
            self.message.push('\n');
        }
        self.message.push_str(note.as_ref());
    }
}

/// Result of a single test execution
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestResult {
    pub group: String,
    pub name: String,
    pub description: Option<String>,
    pub skipped: bool,
    pub skipped_reason: String,
    /// Unexpected error (crash); never set together with `failure`
    pub error: Option<Payload>,
    /// Assertion-style failure
    pub failure: Option<Payload>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TestResult {
    /// Fresh result for `test_case`, stamped with the current time
    pub fn start(test_case: &TestCase) -> Self {
        Self {
            group: test_case.group.clone(),
            name: test_case.name.clone(),
            description: test_case.description.clone(),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn skip(test_case: &TestCase, reason: impl Into<String>) -> Self {
        Self {
            group: test_case.group.clone(),
            name: test_case.name.clone(),
            description: test_case.description.clone(),
            skipped: true,
            skipped_reason: reason.into(),
            ..Self::default()
        }
    }

    /// Crashed result built outside the per-test state machine
    pub fn crashed(test_case: &TestCase, message: impl Into<String>) -> Self {
        Self::crashed_since(test_case, message, Utc::now())
    }

    /// Crashed result for a worker launched at `started_at`
    pub fn crashed_since(
        test_case: &TestCase,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            error: Some(Payload::from_message(message)),
            started_at: Some(started_at),
            ended_at: Some(Utc::now()),
            ..Self::start(test_case)
        }
    }

    /// Record a crash; an existing failure is discarded
    pub fn set_error(&mut self, payload: Payload) {
        self.failure = None;
        self.error = Some(payload);
    }

    pub fn set_failure(&mut self, payload: Payload) {
        if self.error.is_none() {
            self.failure = Some(payload);
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn status(&self) -> Status {
        if self.is_error() {
            Status::Crashed
        } else if self.is_failure() {
            Status::Failed
        } else if self.skipped {
            Status::Skipped
        } else {
            Status::Ok
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Ok
    }

    pub fn group_and_name(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    /// Crash text if any, else failure text, else empty
    pub fn formatted_message(&self) -> &str {
        self.error
            .as_ref()
            .or(self.failure.as_ref())
            .map(|p| p.message.as_str())
            .unwrap_or("")
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration().map(|d| d.num_milliseconds()).unwrap_or(0)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        write!(
            f,
            "{} {} {} [{}ms]",
            status.symbol(),
            self.group_and_name(),
            status,
            self.duration_ms()
        )?;
        if self.skipped && !self.skipped_reason.is_empty() {
            write!(f, " - {}", self.skipped_reason)?;
        }
        Ok(())
    }
}

/// Outcome counts for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub ok: usize,
    pub failed: usize,
    pub crashed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::Failed => self.failed += 1,
            Status::Crashed => self.crashed += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.failed + self.crashed + self.skipped
    }

    pub fn pass_rate(&self) -> f64 {
        let ran = self.ok + self.failed + self.crashed;
        if ran == 0 {
            0.0
        } else {
            (self.ok as f64 / ran as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed == 0 && self.crashed == 0
    }
}

impl<'a> FromIterator<&'a TestResult> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a TestResult>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for result in iter {
            tally.record(result.status());
        }
        tally
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "executed ok: {}, errors: {}, failures: {}, skipped: {}",
            self.ok, self.crashed, self.failed, self.skipped
        )
    }
}
