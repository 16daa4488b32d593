//! Core columnar-format library: aligned buffers, validity bitmaps, the
//! typed array layouts Arrow defines, and the C Data Interface for sharing
//! them across an FFI boundary without copying.
//!
//! The layout types live under [`array`], one module per physical layout.
//! Every layout is built on top of an [`ffi::ArrowProxy`], which owns the
//! `ArrowArray`/`ArrowSchema` pair and is what actually crosses the FFI
//! boundary; the typed wrappers in [`array`] are thin, checked views over
//! that shared representation.

pub mod array;
pub mod bitmap;
pub mod buffer;
pub mod datatype;
pub mod decimal;
pub mod error;
pub mod ffi;
pub mod nullable;

pub use array::Array;
pub use bitmap::Bitmap;
pub use buffer::AlignedBuffer;
pub use datatype::{DataType, TimeUnit};
pub use decimal::{I128Bytes, I256Bytes};
pub use error::{Error, Result};
pub use ffi::{ArrowArray, ArrowProxy, ArrowSchema};
pub use nullable::Nullable;
