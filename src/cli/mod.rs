//! CLI argument parsing
//!
//! Defines the command-line interface of a test binary using clap and the
//! `run_main` entry point that drives a whole run.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{EnvConfig, RunConfig};
use crate::error::QaResult;
use crate::executor::{is_worker, serve_if_worker, ConcurrencyMode, Engine};
use crate::output::{OutputFormat, Reporter};
use crate::plugin::PluginSet;
use crate::registry::Registry;
use crate::utils::logger::{init_logger, init_worker_logger, LogLevel};

/// Run registered tests
#[derive(Parser, Debug, Default)]
#[command(name = "qa")]
#[command(version)]
#[command(about = "Run registered tests sequentially, on a thread pool or on a process pool")]
#[command(long_about = None)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug logging for test scheduling and registration
    #[arg(short, long)]
    pub debug: bool,

    /// Only run tests whose `group:name` matches one of these regular expressions
    #[arg(short, long = "filter", value_name = "REGEX")]
    pub filters: Vec<String>,

    /// Concurrency mode (single, thread, process)
    #[arg(short = 'c', long)]
    pub concurrency_mode: Option<ConcurrencyMode>,

    /// Number of workers for the thread and process modes
    #[arg(short = 'w', long)]
    pub num_workers: Option<usize>,

    /// Output format (log, table, json, summary)
    #[arg(long)]
    pub format: Option<String>,

    /// Config file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut RunConfig) -> QaResult<()> {
        if let Some(mode) = self.concurrency_mode {
            config.mode = mode;
        }
        if let Some(workers) = self.num_workers {
            config.num_workers = workers;
        }
        if !self.filters.is_empty() {
            config.filters = self.filters.clone();
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if self.verbose {
            config.log_level = "debug".to_string();
        }
        config.validate()
    }

    /// Full configuration: defaults, config file, environment, then flags
    pub fn resolve(&self, env: &EnvConfig) -> QaResult<RunConfig> {
        let mut config = RunConfig::resolve(self.config.as_deref(), env)?;
        self.apply(&mut config)?;
        Ok(config)
    }
}

/// Build the engine a configuration describes
pub fn engine(registry: Arc<Registry>, plugins: PluginSet, config: &RunConfig) -> QaResult<Engine> {
    Ok(Engine::new(registry)
        .with_plugins(plugins)
        .with_mode(config.mode)
        .with_workers(config.workers())
        .with_filter(config.name_filter()?))
}

/// Entry point for a test binary
///
/// Serves a single test when this process is a process-pool worker;
/// otherwise parses the command line, runs every matching test and returns
/// the exit code: 0 when nothing failed or crashed, 1 otherwise.
pub async fn run_main(registry: Arc<Registry>, plugins: PluginSet) -> Result<i32> {
    if is_worker() {
        init_worker_logger();
    }
    if let Some(code) = serve_if_worker(&registry, &plugins) {
        return Ok(code);
    }

    let args = Args::parse();
    let config = args.resolve(&EnvConfig::load())?;
    init_logger(config.log_level.parse::<LogLevel>()?, args.debug);

    let format = OutputFormat::from_str(&config.format)?;
    info!(
        target: "qa::run",
        "running {} registered tests in {} mode",
        registry.len(),
        config.mode
    );

    let engine = engine(registry, plugins, &config)?;
    let tally = Reporter::new(format).consume(engine.run()).await;
    Ok(if tally.is_all_passed() { 0 } else { 1 })
}
