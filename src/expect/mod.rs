//! Assertion primitives
//!
//! Each `expect_*` function returns `Err(Failure)` when its relation does
//! not hold. A test body propagates it with `?`, and the engine reports the
//! test as failed rather than crashed.
//!
//! ```
//! use qa::{expect_eq, expect_lt, Failure};
//!
//! fn check() -> Result<(), Failure> {
//!     expect_eq(&(1 + 1), &2)?;
//!     expect_lt(&1, &2)?;
//!     Ok(())
//! }
//! assert!(check().is_ok());
//! assert!(expect_eq(&1, &2).unwrap_err().to_string().contains("1 == 2"));
//! ```

mod truthy;

pub use truthy::{Container, Truthy};

use std::any::Any;
use std::error::Error as StdError;
use std::fmt::Debug;
use thiserror::Error;

use crate::utils::panic::panic_message;

/// Assertion-style test failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected: {message}")]
pub struct Failure {
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Expectation = Result<(), Failure>;

fn check(holds: bool, message: impl FnOnce() -> String) -> Expectation {
    if holds {
        Ok(())
    } else {
        Err(Failure::new(message()))
    }
}

/// Fail unconditionally
pub fn fail(message: impl Into<String>) -> Expectation {
    Err(Failure::new(message))
}

pub fn expect_eq<L, R>(left: &L, right: &R) -> Expectation
where
    L: PartialEq<R> + Debug + ?Sized,
    R: Debug + ?Sized,
{
    check(left == right, || format!("{left:?} == {right:?}"))
}

pub fn expect_ne<L, R>(left: &L, right: &R) -> Expectation
where
    L: PartialEq<R> + Debug + ?Sized,
    R: Debug + ?Sized,
{
    check(left != right, || format!("{left:?} != {right:?}"))
}

pub fn expect_gt<L, R>(left: &L, right: &R) -> Expectation
where
    L: PartialOrd<R> + Debug + ?Sized,
    R: Debug + ?Sized,
{
    check(left > right, || format!("{left:?} > {right:?}"))
}

pub fn expect_ge<L, R>(left: &L, right: &R) -> Expectation
where
    L: PartialOrd<R> + Debug + ?Sized,
    R: Debug + ?Sized,
{
    check(left >= right, || format!("{left:?} >= {right:?}"))
}

pub fn expect_lt<L, R>(left: &L, right: &R) -> Expectation
where
    L: PartialOrd<R> + Debug + ?Sized,
    R: Debug + ?Sized,
{
    check(left < right, || format!("{left:?} < {right:?}"))
}

pub fn expect_le<L, R>(left: &L, right: &R) -> Expectation
where
    L: PartialOrd<R> + Debug + ?Sized,
    R: Debug + ?Sized,
{
    check(left <= right, || format!("{left:?} <= {right:?}"))
}

pub fn expect_some<T: Debug>(value: &Option<T>) -> Expectation {
    check(value.is_some(), || format!("{value:?} is not None"))
}

/// Expect a truthy value (`true`, `Some`, non-zero, non-empty)
pub fn expect<T: Truthy + Debug + ?Sized>(value: &T) -> Expectation {
    check(value.truthy(), || format!("{value:?}"))
}

pub fn expect_not<T: Truthy + Debug + ?Sized>(value: &T) -> Expectation {
    check(!value.truthy(), || format!("not {value:?}"))
}

pub fn expect_contains<N, C>(needle: &N, haystack: &C) -> Expectation
where
    N: Debug + ?Sized,
    C: Container<N> + Debug + ?Sized,
{
    check(haystack.contains_item(needle), || {
        format!("{needle:?} in {haystack:?}")
    })
}

/// Expect `value` to be of concrete type `T`
pub fn expect_is<T: Any>(value: &dyn Any) -> Expectation {
    check(value.is::<T>(), || {
        format!("value isinstance {}", std::any::type_name::<T>())
    })
}

/// Expect `block` to return an error whose chain contains an `E`
///
/// Succeeds on an `E`; fails when the block returns `Ok` or an error of
/// another type.
pub fn expect_raises<E, T>(block: impl FnOnce() -> anyhow::Result<T>) -> Expectation
where
    E: StdError + Send + Sync + 'static,
{
    let name = std::any::type_name::<E>();
    match block() {
        Ok(_) => fail(format!("{name} to be raised")),
        Err(err) if err.chain().any(|cause| cause.is::<E>()) => Ok(()),
        Err(err) => fail(format!("{name} to be raised, got {err:#}")),
    }
}

/// Like [`expect_raises`] for blocks returning a concrete error type
pub fn expect_raises_in<E, T>(block: impl FnOnce() -> Result<T, E>) -> Expectation
where
    E: StdError + Send + Sync + 'static,
{
    expect_raises::<E, T>(|| block().map_err(anyhow::Error::new))
}

/// Expect `block` to panic
pub fn expect_panics<T>(block: impl FnOnce() -> T) -> Expectation {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(block)) {
        Ok(_) => fail("block to panic"),
        Err(payload) => {
            tracing::debug!(
                target: "qa::run",
                "expected panic: {}",
                panic_message(payload.as_ref())
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Error, Debug)]
    #[error("missing key {0}")]
    struct KeyError(u32);

    #[derive(Error, Debug)]
    #[error("other")]
    struct OtherError;

    fn lookup(map: &HashMap<u32, u32>, key: u32) -> Result<u32, KeyError> {
        map.get(&key).copied().ok_or(KeyError(key))
    }

    #[test]
    fn test_eq() {
        assert!(expect_eq(&1, &1).is_ok());
        let failure = expect_eq(&1, &2).unwrap_err();
        assert_eq!(failure.to_string(), "expected: 1 == 2");
    }

    #[test]
    fn test_ordering_relations() {
        assert!(expect_ne(&1, &2).is_ok());
        assert!(expect_gt(&2, &1).is_ok());
        assert!(expect_ge(&2, &2).is_ok());
        assert!(expect_lt(&1, &2).is_ok());
        assert!(expect_le(&2, &2).is_ok());

        assert_eq!(expect_gt(&1, &2).unwrap_err().message, "1 > 2");
        assert_eq!(expect_le(&3, &2).unwrap_err().message, "3 <= 2");
        assert_eq!(expect_ne(&"a", &"a").unwrap_err().message, "\"a\" != \"a\"");
    }

    #[test]
    fn test_mixed_operand_types() {
        let owned = String::from("abc");
        assert!(expect_eq(owned.as_str(), "abc").is_ok());
        assert!(expect_eq(&owned, &"abc").is_ok());
    }

    #[test]
    fn test_truthiness() {
        assert!(expect(&true).is_ok());
        assert!(expect(&1).is_ok());
        assert!(expect(&Some(0)).is_ok());
        assert!(expect(&false).is_err());
        assert!(expect_not(&false).is_ok());
        assert!(expect_not(&0).is_ok());
        assert!(expect_not(&"").is_ok());
        assert!(expect_not(&vec![1]).is_err());
        assert_eq!(expect_not(&true).unwrap_err().message, "not true");
    }

    #[test]
    fn test_some() {
        assert!(expect_some(&Some(false)).is_ok());
        assert!(expect_some(&Some(0)).is_ok());
        assert_eq!(
            expect_some::<i32>(&None).unwrap_err().message,
            "None is not None"
        );
    }

    #[test]
    fn test_contains() {
        assert!(expect_contains(&2, &vec![1, 2, 3]).is_ok());
        assert!(expect_contains("ell", "hello").is_ok());
        assert_eq!(
            expect_contains(&5, &[1, 2][..]).unwrap_err().message,
            "5 in [1, 2]"
        );
        let map = HashMap::from([("k", 1)]);
        assert!(expect_contains(&"k", &map).is_ok());
    }

    #[test]
    fn test_is() {
        let value: Box<dyn Any> = Box::new(5u8);
        assert!(expect_is::<u8>(value.as_ref()).is_ok());
        assert!(expect_is::<String>(value.as_ref()).is_err());
    }

    #[test]
    fn test_raises() {
        let map = HashMap::new();
        assert!(expect_raises_in::<KeyError, _>(|| lookup(&map, 0)).is_ok());
        assert!(expect_raises::<KeyError, _>(|| Ok(lookup(&map, 0)?)).is_ok());

        let full = HashMap::from([(0, 1)]);
        let failure = expect_raises_in::<KeyError, _>(|| lookup(&full, 0)).unwrap_err();
        assert!(failure.message.contains("KeyError to be raised"));

        let failure =
            expect_raises::<KeyError, ()>(|| Err(OtherError.into())).unwrap_err();
        assert!(failure.message.contains("got other"));
    }

    #[test]
    fn test_raises_failure_itself() {
        assert!(expect_raises::<Failure, _>(|| Ok(expect(&false)?)).is_ok());
        assert!(expect_raises::<Failure, _>(|| Ok(expect_not(&true)?)).is_ok());
        assert!(expect_raises::<Failure, _>(|| Ok(expect_some::<u8>(&None)?)).is_ok());
    }

    #[test]
    fn test_panics() {
        assert!(expect_panics(|| panic!("boom")).is_ok());
        assert!(expect_panics(|| 1).is_err());
    }
}
