//! Result reporting
//!
//! Consumes a result stream, logs each outcome at a level keyed to its
//! status and returns the final tally.

use futures::{Stream, StreamExt};
use tracing::{error, info, warn};

use super::{OutputFormat, ResultFormatter};
use crate::models::{Status, Tally, TestResult};

/// Logs results and counts outcomes
pub struct Reporter {
    formatter: ResultFormatter,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            formatter: ResultFormatter::new(format),
        }
    }

    pub fn with_formatter(formatter: ResultFormatter) -> Self {
        Self { formatter }
    }

    /// Log and print one result
    pub fn report(&self, result: &TestResult) {
        let status = result.status();
        match status {
            Status::Ok => info!(target: "qa::result", "test {:?} {}", result.group_and_name(), status),
            Status::Skipped => warn!(target: "qa::result", "test {:?} {}", result.group_and_name(), status),
            Status::Failed | Status::Crashed => error!(
                target: "qa::result",
                "test {:?} {}:\n{}",
                result.group_and_name(),
                status,
                result.formatted_message()
            ),
        }
        if let Some(line) = self.formatter.format_result(result) {
            println!("{line}");
        }
    }

    /// Drain `results`, reporting each, and return the tally
    pub async fn consume<S>(&self, results: S) -> Tally
    where
        S: Stream<Item = TestResult>,
    {
        let mut tally = Tally::default();
        futures::pin_mut!(results);
        while let Some(result) = results.next().await {
            tally.record(result.status());
            self.report(&result);
        }
        info!(target: "qa::result", "{}", tally);
        if let Some(summary) = self.formatter.format_tally(&tally) {
            println!("{summary}");
        }
        tally
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::Log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{testcase, Payload};
    use futures::stream;

    #[tokio::test]
    async fn test_consume_counts_every_status() {
        let case = testcase("t", |_| Ok(())).build();
        let mut failed = TestResult::start(&case);
        failed.set_failure(Payload::from_message("nope"));
        let results = vec![
            TestResult::start(&case),
            TestResult::start(&case),
            failed,
            TestResult::crashed(&case, "boom"),
            TestResult::skip(&case, "later"),
        ];

        let tally = Reporter::default().consume(stream::iter(results)).await;
        assert_eq!(
            tally,
            Tally {
                ok: 2,
                failed: 1,
                crashed: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_consume_empty() {
        let tally = tokio_test::block_on(
            Reporter::new(OutputFormat::Summary).consume(stream::iter(Vec::<TestResult>::new())),
        );
        assert_eq!(tally, Tally::default());
        assert!(tally.is_all_passed());
    }
}
