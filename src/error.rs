//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds enumerated in the format specification this crate
//! implements: a failed constructor never leaves a partially built array
//! observable to the caller, and a recoverable mutation error leaves the
//! array unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// A construction input would break one of the layout's buffer
    /// invariants (non-monotone offsets, oversized element for a
    /// fixed-width slot, dictionary index out of range, ...).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A format string does not correspond to the layout being
    /// constructed, or is not a recognized format string at all.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// A checked index exceeded `size()`.
    #[error("index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// A requested allocation is larger than the allocator can satisfy.
    #[error("length error: requested {requested} elements exceeds max {max}")]
    LengthError { requested: usize, max: usize },

    /// `value()` was called on an absent `Nullable`.
    #[error("bad access: value requested on a null element")]
    BadAccess,
}

impl Error {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Error::FormatMismatch(msg.into())
    }
}
