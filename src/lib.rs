//! qa - test orchestration engine
//!
//! Registers test cases with their fixtures, runs them sequentially, on a
//! worker-thread pool or on a worker-process pool, and streams back one
//! result per test.
//!
//! ## Features
//!
//! - Fixtures entered in order and unwound in reverse, with a shared context
//! - Plugins that can skip tests, add fixtures and observe every outcome
//! - Failures (`expect_*`) reported apart from crashes (errors and panics)
//! - Regex name filters over `group:name`
//! - Bounded thread and process pools yielding results in completion order
//!
//! ## Usage
//!
//! ```no_run
//! use qa::{expect_eq, testcase, Fixture, PluginSet, Registry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Registry::global();
//!     let answer = Fixture::new(
//!         "answer",
//!         |ctx| {
//!             ctx.insert("answer", 42_i32);
//!             Ok(())
//!         },
//!         |ctx| {
//!             ctx.discard("answer");
//!             Ok(())
//!         },
//!     )
//!     .shared();
//!
//!     testcase("answer", |ctx| {
//!         Ok(expect_eq(ctx.get::<i32>("answer").unwrap_or(&0), &42)?)
//!     })
//!     .group("demo")
//!     .require(answer)
//!     .register(&registry);
//!
//!     std::process::exit(qa::run_main(registry, PluginSet::new()).await?);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod expect;
pub mod fixture;
pub mod models;
pub mod output;
pub mod plugin;
pub mod registry;
pub mod utils;

pub use cli::run_main;
pub use error::{QaError, QaResult};
pub use executor::{serve_if_worker, ConcurrencyMode, Engine};
pub use expect::{
    expect, expect_contains, expect_eq, expect_ge, expect_gt, expect_is, expect_le, expect_lt,
    expect_ne, expect_not, expect_panics, expect_raises, expect_raises_in, expect_some, fail,
    Expectation, Failure,
};
pub use fixture::{Fixture, FixtureStack, Requirement};
pub use models::{testcase, Context, Slot, Status, Tally, TestCase, TestResult};
pub use plugin::{Plugin, PluginSet, ShouldRun, WorkerKind};
pub use registry::{NameFilter, Registry};
