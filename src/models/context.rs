//! Per-execution context
//!
//! A `Context` is created fresh for every test execution and handed to each
//! fixture and to the test body. Entries can be addressed by name or through
//! typed [`Slot`] keys; both views read and write the same storage.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Typed, named key into a [`Context`]
///
/// ```
/// use qa::{Context, Slot};
///
/// const USER: Slot<String> = Slot::new("user");
///
/// let mut ctx = Context::new();
/// ctx.set(&USER, "alice".to_string());
/// assert_eq!(ctx.get::<String>("user").map(String::as_str), Some("alice"));
/// ```
pub struct Slot<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({:?})", self.name)
    }
}

/// Mutable key-value scope owned by one test execution
#[derive(Default)]
pub struct Context {
    entries: Vec<(String, Box<dyn Any + Send>)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    /// Insert or replace an entry, keeping its original position on replace
    pub fn insert<T: Any + Send>(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = Box::new(value),
            None => self.entries.push((name, Box::new(value))),
        }
    }

    /// Get an entry by name, `None` when missing or of another type
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.position(name)
            .and_then(|idx| self.entries[idx].1.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        match self.position(name) {
            Some(idx) => self.entries[idx].1.downcast_mut::<T>(),
            None => None,
        }
    }

    /// Remove an entry and return it when it has the requested type
    ///
    /// An entry of a different type is left in place.
    pub fn remove<T: Any>(&mut self, name: &str) -> Option<T> {
        let idx = self.position(name)?;
        if !self.entries[idx].1.is::<T>() {
            return None;
        }
        let (_, value) = self.entries.remove(idx);
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Drop an entry regardless of its type
    pub fn discard(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Entry names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set<T: Any + Send>(&mut self, slot: &Slot<T>, value: T) {
        self.insert(slot.name, value);
    }

    pub fn slot<T: Any>(&self, slot: &Slot<T>) -> Option<&T> {
        self.get(slot.name)
    }

    pub fn slot_mut<T: Any>(&mut self, slot: &Slot<T>) -> Option<&mut T> {
        self.get_mut(slot.name)
    }

    pub fn take<T: Any>(&mut self, slot: &Slot<T>) -> Option<T> {
        self.remove(slot.name)
    }

    /// Like [`Context::slot`], but a missing entry is an error
    ///
    /// The error is not a [`Failure`](crate::Failure), so a test that uses
    /// `?` on it is reported as crashed.
    pub fn require<T: Any>(&self, slot: &Slot<T>) -> anyhow::Result<&T> {
        self.slot(slot).ok_or_else(|| {
            anyhow::anyhow!(
                "context has no entry {:?} of type {}",
                slot.name,
                std::any::type_name::<T>()
            )
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: Slot<u32> = Slot::new("count");

    #[test]
    fn test_named_and_slot_views_commute() {
        let mut ctx = Context::new();
        ctx.insert("count", 1u32);
        assert_eq!(ctx.slot(&COUNT), Some(&1));

        *ctx.slot_mut(&COUNT).unwrap() += 1;
        assert_eq!(ctx.get::<u32>("count"), Some(&2));

        ctx.set(&COUNT, 10);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get::<u32>("count"), Some(&10));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut ctx = Context::new();
        ctx.insert("b", 1);
        ctx.insert("a", 2);
        ctx.insert("b", 3);
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_wrong_type_is_none() {
        let mut ctx = Context::new();
        ctx.insert("count", "not a number");
        assert!(ctx.slot(&COUNT).is_none());
        assert!(ctx.remove::<u32>("count").is_none());
        assert!(ctx.contains("count"));
        assert!(ctx.discard("count"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_require_missing() {
        let ctx = Context::new();
        let err = ctx.require(&COUNT).unwrap_err();
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn test_take() {
        let mut ctx = Context::new();
        ctx.set(&COUNT, 7);
        assert_eq!(ctx.take(&COUNT), Some(7));
        assert!(!ctx.contains("count"));
    }
}
