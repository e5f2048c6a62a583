//! Output formatters for test results
//!
//! Provides table, JSON and summary renderings of single results and of the
//! final tally.

use serde::Serialize;

use crate::error::QaError;
use crate::models::{Status, Tally, TestResult};

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Log lines only, nothing on stdout
    #[default]
    Log,
    Table,
    Json,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self, QaError> {
        match s.to_lowercase().as_str() {
            "log" => Ok(OutputFormat::Log),
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "summary" => Ok(OutputFormat::Summary),
            _ => Err(QaError::ConfigParse {
                path: "--format".to_string(),
                message: format!("unknown output format {s:?}"),
            }),
        }
    }
}

/// JSON shape of one result line
#[derive(Serialize)]
struct ResultLine<'a> {
    status: Status,
    #[serde(flatten)]
    result: &'a TestResult,
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a single result; `None` when the format prints nothing per test
    pub fn format_result(&self, result: &TestResult) -> Option<String> {
        match self.format {
            OutputFormat::Log | OutputFormat::Summary => None,
            OutputFormat::Table => Some(self.format_result_table(result)),
            OutputFormat::Json => serde_json::to_string(&ResultLine {
                status: result.status(),
                result,
            })
            .ok(),
        }
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        let status = result.status();
        let label = format!("{} {}", status.symbol(), status.as_str().to_uppercase());
        let label = if self.colorize {
            let color = match status {
                Status::Ok => "32",
                Status::Skipped => "33",
                Status::Failed | Status::Crashed => "31",
            };
            format!("\x1b[{color}m{label:10}\x1b[0m")
        } else {
            format!("{label:10}")
        };

        let mut line = format!(
            "{} {:40} [{:>6}ms]",
            label,
            result.group_and_name(),
            result.duration_ms()
        );
        if result.skipped && !result.skipped_reason.is_empty() {
            line.push_str(&format!(" - {}", result.skipped_reason));
        }
        line
    }

    /// Render the final tally
    pub fn format_tally(&self, tally: &Tally) -> Option<String> {
        match self.format {
            OutputFormat::Log => None,
            OutputFormat::Json => serde_json::to_string(tally).ok(),
            OutputFormat::Summary => Some(tally.to_string()),
            OutputFormat::Table => {
                let mut output = String::new();
                output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
                output.push_str(&format!(
                    "Total: {} | Ok: {} | Failed: {} | Crashed: {} | Skipped: {}\n",
                    tally.total(),
                    tally.ok,
                    tally.failed,
                    tally.crashed,
                    tally.skipped
                ));
                output.push_str(&format!("Pass Rate: {:.1}%", tally.pass_rate()));
                Some(output)
            }
        }
    }
}
