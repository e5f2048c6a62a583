//! Panic capture helpers

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Text carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Run `f`, turning a panic into an error that names `what`
pub fn catch<T>(what: &str, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "{what} panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}
