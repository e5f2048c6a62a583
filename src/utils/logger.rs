//! Logging utilities
//!
//! Installs the `tracing` subscriber used by the runner binary.

use std::str::FromStr;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;
use crate::error::QaError;

/// Filter directives handed from the supervisor to its worker processes
pub const ENV_WORKER_LOG: &str = "QA_WORKER_LOG";

static ACTIVE_DIRECTIVES: OnceLock<String> = OnceLock::new();

/// Log level configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(QaError::ConfigParse {
                path: "log_level".to_string(),
                message: format!("unknown log level {s:?}"),
            }),
        }
    }
}

/// Filter directives for `level`
///
/// Results and run progress are logged at info or more verbose whatever the
/// crate level. `debug_run` turns on debug for the run and register targets.
pub fn directives(level: LogLevel, debug_run: bool) -> String {
    let level = level.to_tracing_level();
    let result_level = level.max(Level::INFO);
    let run_level = if debug_run {
        Level::DEBUG.max(level)
    } else {
        result_level
    };
    let mut directives = format!("qa={level},qa::result={result_level},qa::run={run_level}");
    if debug_run {
        directives.push_str(&format!(",qa::register={}", Level::DEBUG.max(level)));
    }
    directives.to_lowercase()
}

/// Initialize the logger; `RUST_LOG` takes precedence when set
pub fn init_logger(level: LogLevel, debug_run: bool) {
    install(directives(level, debug_run));
}

/// Initialize the logger of a worker process
///
/// Uses the supervisor's directives when it passed them, otherwise the
/// `QA_LOG` level.
pub fn init_worker_logger() {
    let passed = std::env::var(ENV_WORKER_LOG).ok();
    install(worker_directives(passed, &EnvConfig::load()));
}

/// Directives installed by this process, if a logger was initialized here
pub fn active_directives() -> Option<&'static str> {
    ACTIVE_DIRECTIVES.get().map(String::as_str)
}

fn worker_directives(passed: Option<String>, env: &EnvConfig) -> String {
    passed.filter(|d| !d.is_empty()).unwrap_or_else(|| {
        let level = env
            .log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or_default();
        directives(level, false)
    })
}

fn install(directives: String) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init();
    if installed.is_ok() {
        let _ = ACTIVE_DIRECTIVES.set(directives);
    }
}
