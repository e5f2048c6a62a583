//! Truthiness and membership traits used by `expect`, `expect_not` and
//! `expect_contains`

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Values with a notion of truthiness
pub trait Truthy {
    fn truthy(&self) -> bool;
}

impl<T: Truthy + ?Sized> Truthy for &T {
    fn truthy(&self) -> bool {
        (**self).truthy()
    }
}

impl Truthy for bool {
    fn truthy(&self) -> bool {
        *self
    }
}

impl<T> Truthy for Option<T> {
    fn truthy(&self) -> bool {
        self.is_some()
    }
}

impl Truthy for str {
    fn truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Truthy for [T] {
    fn truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Truthy for Vec<T> {
    fn truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> Truthy for HashMap<K, V> {
    fn truthy(&self) -> bool {
        !self.is_empty()
    }
}

macro_rules! truthy_number {
    ($($t:ty),*) => {
        $(impl Truthy for $t {
            fn truthy(&self) -> bool {
                *self != (0 as $t)
            }
        })*
    };
}

truthy_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Collections that can answer membership queries
pub trait Container<N: ?Sized> {
    fn contains_item(&self, needle: &N) -> bool;
}

impl Container<str> for str {
    fn contains_item(&self, needle: &str) -> bool {
        self.contains(needle)
    }
}

impl Container<str> for String {
    fn contains_item(&self, needle: &str) -> bool {
        self.contains(needle)
    }
}

impl Container<&str> for String {
    fn contains_item(&self, needle: &&str) -> bool {
        self.contains(*needle)
    }
}

impl Container<char> for str {
    fn contains_item(&self, needle: &char) -> bool {
        self.contains(*needle)
    }
}

impl<T: PartialEq> Container<T> for [T] {
    fn contains_item(&self, needle: &T) -> bool {
        self.contains(needle)
    }
}

impl<T: PartialEq, const N: usize> Container<T> for [T; N] {
    fn contains_item(&self, needle: &T) -> bool {
        self.as_slice().contains(needle)
    }
}

impl<T: PartialEq> Container<T> for Vec<T> {
    fn contains_item(&self, needle: &T) -> bool {
        self.as_slice().contains(needle)
    }
}

impl<T: PartialEq> Container<T> for VecDeque<T> {
    fn contains_item(&self, needle: &T) -> bool {
        self.contains(needle)
    }
}

impl<T: Eq + Hash> Container<T> for HashSet<T> {
    fn contains_item(&self, needle: &T) -> bool {
        self.contains(needle)
    }
}

impl<T: Ord> Container<T> for BTreeSet<T> {
    fn contains_item(&self, needle: &T) -> bool {
        self.contains(needle)
    }
}

/// Maps answer membership for their keys
impl<K, Q, V> Container<Q> for HashMap<K, V>
where
    K: Eq + Hash + Borrow<Q>,
    Q: Eq + Hash + ?Sized,
{
    fn contains_item(&self, needle: &Q) -> bool {
        self.contains_key(needle)
    }
}

impl<K, Q, V> Container<Q> for BTreeMap<K, V>
where
    K: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
{
    fn contains_item(&self, needle: &Q) -> bool {
        self.contains_key(needle)
    }
}
