//! One module per column encoding. Every layout wraps an [`ArrowProxy`] and
//! exposes `size()`, `operator[]`-equivalent nullable element access,
//! `values()`/`bitmap()` where applicable, and bulk slicing, per `# 3`'s
//! array-façade contract.

pub mod binary_view;
pub mod decimal;
pub mod dictionary;
pub mod fixed_size_binary;
pub mod fixed_size_list;
pub mod list;
pub mod list_view;
pub mod null;
pub mod primitive;
pub mod run_end_encoded;
pub mod struct_array;
pub mod union;
pub mod variable_binary;

use crate::bitmap::Bitmap;
use crate::error::Result;
use crate::ffi::ArrowProxy;

/// Offset width used by variable-length layouts: `i32` for the default
/// (32-bit) variants, `i64` for the `large_*` variants.
pub trait OffsetWidth:
    bytemuck::Pod
    + num_traits::PrimInt
    + num_traits::Zero
    + Copy
    + std::fmt::Debug
    + Into<i64>
    + TryFrom<i64>
{
}
impl OffsetWidth for i32 {}
impl OffsetWidth for i64 {}

/// Common surface every layout façade exposes over its [`ArrowProxy`].
pub trait Array {
    #[must_use]
    fn len(&self) -> usize;

    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    fn null_count(&self) -> i64;

    #[must_use]
    fn is_valid(&self, index: usize) -> bool;

    #[must_use]
    fn name(&self) -> Option<&str>;
}

/// Reads the validity bitmap (buffer 0) out of a proxy into an owned
/// [`Bitmap`], or `None` if the layout carries no bitmap buffer (e.g. a
/// null-count of zero with a null buffer pointer, matching the C Data
/// Interface's "all valid" shortcut).
#[must_use]
pub fn read_validity_bitmap(proxy: &ArrowProxy, len: usize) -> Option<Bitmap> {
    if proxy.n_buffers() == 0 {
        return None;
    }
    let ptr = proxy.buffer_ptr(0);
    if ptr.is_null() {
        return None;
    }
    let byte_len = (len + 7) / 8;
    let bytes = unsafe { std::slice::from_raw_parts(ptr, byte_len) };
    Some(Bitmap::from_bytes(
        crate::buffer::AlignedBuffer::from_slice(bytes),
        len,
    ))
}

/// Checked index helper shared by every layout's `at(i)`.
pub fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        Err(crate::error::Error::OutOfRange { index, len })
    } else {
        Ok(())
    }
}

/// Confirms a just-adopted proxy's bitmap-buffer presence agrees with what
/// its logical type allows, catching a malformed foreign array before any
/// element is read through it.
pub fn check_validity_buffer_presence(
    proxy: &ArrowProxy,
    dt: &crate::datatype::DataType,
) -> Result<()> {
    let has_buffer = proxy.n_buffers() > 0 && !proxy.buffer_ptr(0).is_null();
    if has_buffer && !dt.has_validity_bitmap() {
        return Err(crate::error::Error::invariant(format!(
            "{dt:?} does not carry a validity bitmap, but buffer 0 is non-null"
        )));
    }
    Ok(())
}
