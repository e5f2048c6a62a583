//! Output module
//!
//! Reports result streams through logging and optional stdout formats.

mod formatter;
mod reporter;

pub use formatter::{OutputFormat, ResultFormatter};
pub use reporter::Reporter;
