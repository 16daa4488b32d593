//! The Arrow C Data Interface: two POD structs with stable, FFI-safe
//! layout and release callbacks, plus the format-string-driven proxy that
//! owns them. Field order and sizes here must match
//! <https://arrow.apache.org/docs/format/CDataInterface.html> exactly —
//! this is the one place in the crate where getting the byte layout wrong
//! breaks every external producer/consumer, not just this crate's own
//! tests.

mod metadata;
pub(crate) mod proxy;

pub use metadata::{decode_metadata, decode_metadata_from_ptr, encode_metadata};
pub use proxy::ArrowProxy;

use std::ffi::{c_char, c_void};
use std::os::raw::c_longlong;

/// Bit 0 of [`ArrowSchema::flags`]: dictionary values are ordered.
pub const ARROW_FLAG_DICTIONARY_ORDERED: i64 = 1;
/// Bit 1: the array may contain nulls.
pub const ARROW_FLAG_NULLABLE: i64 = 2;
/// Bit 2: for a map type, keys within each row are sorted.
pub const ARROW_FLAG_MAP_KEYS_SORTED: i64 = 4;

/// `null_count == -1` means "unknown, recompute from the bitmap on demand."
pub const NULL_COUNT_UNKNOWN: i64 = -1;

/// The schema half of the C Data Interface: format string, optional name
/// and metadata, flags, children, optional dictionary schema, and a release
/// callback. `extern "C"`/POD by construction (`#[repr(C)]`, raw pointers
/// only).
#[repr(C)]
pub struct ArrowSchema {
    pub format: *const c_char,
    pub name: *const c_char,
    pub metadata: *const c_char,
    pub flags: c_longlong,
    pub n_children: c_longlong,
    pub children: *mut *mut ArrowSchema,
    pub dictionary: *mut ArrowSchema,
    pub release: Option<unsafe extern "C" fn(*mut ArrowSchema)>,
    pub private_data: *mut c_void,
}

/// The array half of the C Data Interface: logical length, null count,
/// logical offset (elements, not bytes), buffer pointers, children, an
/// optional dictionary array, and a release callback.
#[repr(C)]
pub struct ArrowArray {
    pub length: c_longlong,
    pub null_count: c_longlong,
    pub offset: c_longlong,
    pub n_buffers: c_longlong,
    pub n_children: c_longlong,
    pub buffers: *mut *const c_void,
    pub children: *mut *mut ArrowArray,
    pub dictionary: *mut ArrowArray,
    pub release: Option<unsafe extern "C" fn(*mut ArrowArray)>,
    pub private_data: *mut c_void,
}

impl ArrowSchema {
    /// An all-zero, unreleased schema struct. Callers fill fields in and set
    /// `release` before handing it across the FFI boundary.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            format: std::ptr::null(),
            name: std::ptr::null(),
            metadata: std::ptr::null(),
            flags: 0,
            n_children: 0,
            children: std::ptr::null_mut(),
            dictionary: std::ptr::null_mut(),
            release: None,
            private_data: std::ptr::null_mut(),
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Invokes `release` exactly once. A second call is a documented no-op
    /// per the release-idempotence property: the callback's final act is to
    /// null out `release` itself.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            unsafe { release(self) };
        }
    }
}

impl ArrowArray {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            length: 0,
            null_count: NULL_COUNT_UNKNOWN,
            offset: 0,
            n_buffers: 0,
            n_children: 0,
            buffers: std::ptr::null_mut(),
            children: std::ptr::null_mut(),
            dictionary: std::ptr::null_mut(),
            release: None,
            private_data: std::ptr::null_mut(),
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            unsafe { release(self) };
        }
    }
}

impl Drop for ArrowSchema {
    fn drop(&mut self) {
        self.release();
    }
}

impl Drop for ArrowArray {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn struct_sizes_are_pointer_sized_fields_only() {
        // Sanity check on layout shape: every field is a pointer, a
        // function pointer, or an i64, so the struct size must be a
        // multiple of the pointer width.
        assert_eq!(size_of::<ArrowSchema>() % size_of::<usize>(), 0);
        assert_eq!(size_of::<ArrowArray>() % size_of::<usize>(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        unsafe extern "C" fn release_cb(schema: *mut ArrowSchema) {
            CALLS.fetch_add(1, Ordering::SeqCst);
            (*schema).release = None;
        }

        let mut schema = ArrowSchema::empty();
        schema.release = Some(release_cb);
        schema.release();
        schema.release();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(schema.is_released());
    }
}
