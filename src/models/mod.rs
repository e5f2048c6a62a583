//! Data models for test orchestration
//!
//! Test descriptors, the per-execution context and execution results.

mod context;
mod test_case;
mod test_result;

pub use context::{Context, Slot};
pub use test_case::{testcase, TestBody, TestCase, TestCaseBuilder};
pub use test_result::{Payload, Status, Tally, TestResult};
