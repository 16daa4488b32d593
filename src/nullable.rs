//! `Nullable<T>`: a present value of `T`, or null.
//!
//! Ordering is "null is less than any present value"; two nulls compare
//! equal; two present values delegate to `T`'s own comparison. This mirrors
//! what the array layouts expose at `operator[]`-equivalent element access.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Sum type over "a value of `T`" and "null".
#[derive(Clone, Copy, Default)]
pub struct Nullable<T> {
    value: T,
    present: bool,
}

impl<T> Nullable<T> {
    #[must_use]
    pub fn some(value: T) -> Self {
        Self {
            value,
            present: true,
        }
    }

    #[must_use]
    pub fn none() -> Self
    where
        T: Default,
    {
        Self {
            value: T::default(),
            present: false,
        }
    }

    /// Constructs from a `(value, flag)` pair, the flag meaning "present".
    #[must_use]
    pub fn from_parts(value: T, present: bool) -> Self {
        Self { value, present }
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.present
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        !self.present
    }

    /// # Errors
    /// Returns [`Error::BadAccess`] if this is null.
    pub fn value(&self) -> Result<&T> {
        if self.present {
            Ok(&self.value)
        } else {
            Err(Error::BadAccess)
        }
    }

    pub fn value_mut(&mut self) -> Result<&mut T> {
        if self.present {
            Ok(&mut self.value)
        } else {
            Err(Error::BadAccess)
        }
    }

    pub fn into_value(self) -> Result<T> {
        if self.present {
            Ok(self.value)
        } else {
            Err(Error::BadAccess)
        }
    }

    #[must_use]
    pub fn value_or(self, default: T) -> T {
        if self.present {
            self.value
        } else {
            default
        }
    }

    #[must_use]
    pub fn as_option(&self) -> Option<&T> {
        self.present.then_some(&self.value)
    }

    pub fn into_option(self) -> Option<T> {
        self.present.then_some(self.value)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Nullable<U>
    where
        U: Default,
    {
        if self.present {
            Nullable::some(f(self.value))
        } else {
            Nullable::none()
        }
    }
}

impl<T> From<Option<T>> for Nullable<T>
where
    T: Default,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Nullable::some(v),
            None => Nullable::none(),
        }
    }
}

impl<T> From<Nullable<T>> for Option<T> {
    fn from(n: Nullable<T>) -> Self {
        n.into_option()
    }
}

impl<T: PartialEq> PartialEq for Nullable<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.present, other.present) {
            (false, false) => true,
            (true, true) => self.value == other.value,
            _ => false,
        }
    }
}
impl<T: Eq> Eq for Nullable<T> {}

impl<T: PartialOrd> PartialOrd for Nullable<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.present, other.present) {
            (false, false) => Some(Ordering::Equal),
            (false, true) => Some(Ordering::Less),
            (true, false) => Some(Ordering::Greater),
            (true, true) => self.value.partial_cmp(&other.value),
        }
    }
}
impl<T: Ord> Ord for Nullable<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.present, other.present) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => self.value.cmp(&other.value),
        }
    }
}

impl<T: std::hash::Hash> std::hash::Hash for Nullable<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.present.hash(state);
        if self.present {
            self.value.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Nullable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.present {
            write!(f, "Some({:?})", self.value)
        } else {
            write!(f, "null")
        }
    }
}
