//! [`ArrowProxy`]: the lifetime-owning handle over one `(array, schema)`
//! pair.
//!
//! Three lifecycle states from `# 4.6`, all represented by the same Rust
//! type (per the design note collapsing "owned" vs "view over C Data
//! Interface" into one type with a runtime ownership flag):
//!
//! - **Create-owned**: [`ArrowProxy::create_owned`] allocates both structs,
//!   stashes the Rust-side buffers/children behind `private_data`, and
//!   wires `release` to a callback that drops that private state.
//! - **Adopt-foreign**: [`ArrowProxy::adopt_foreign`] moves the *contents*
//!   of two externally-owned structs into freshly boxed copies and nulls
//!   the source's `release` field, so only one side ever calls it.
//! - **Transfer-out**: [`ArrowProxy::transfer_out`] consumes `self` and
//!   hands the two structs back by value; the type system forbids further
//!   use, matching "subsequent operations on the proxy are forbidden."

use std::ffi::{c_void, CStr, CString};

use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::{encode_metadata, ArrowArray, ArrowSchema, NULL_COUNT_UNKNOWN};

/// Rust-side state kept alive behind `ArrowArray::private_data` for a
/// proxy-allocated array. Dropping this drops the owned buffers and (via
/// each child `ArrowArray`'s own `Drop`) recursively releases every child
/// and the dictionary.
struct OwnedArrayPrivate {
    buffers: Vec<AlignedBuffer<u8>>,
    buffer_ptrs: Vec<*const c_void>,
    children: Vec<Box<ArrowArray>>,
    children_ptrs: Vec<*mut ArrowArray>,
    dictionary: Option<Box<ArrowArray>>,
}

struct OwnedSchemaPrivate {
    format: CString,
    name: Option<CString>,
    metadata: Option<Vec<u8>>,
    children: Vec<Box<ArrowSchema>>,
    children_ptrs: Vec<*mut ArrowSchema>,
    dictionary: Option<Box<ArrowSchema>>,
}

unsafe extern "C" fn release_owned_array(array: *mut ArrowArray) {
    unsafe {
        let private = Box::from_raw((*array).private_data as *mut OwnedArrayPrivate);
        drop(private);
        (*array).release = None;
        (*array).private_data = std::ptr::null_mut();
    }
}

unsafe extern "C" fn release_owned_schema(schema: *mut ArrowSchema) {
    unsafe {
        let private = Box::from_raw((*schema).private_data as *mut OwnedSchemaPrivate);
        drop(private);
        (*schema).release = None;
        (*schema).private_data = std::ptr::null_mut();
    }
}

/// Everything needed to build one owned array/schema pair through
/// [`ArrowProxy::create_owned`].
pub struct OwnedArraySpec {
    pub format: String,
    pub name: Option<String>,
    pub metadata: Option<Vec<(Vec<u8>, Vec<u8>)>>,
    pub flags: i64,
    pub length: usize,
    pub null_count: i64,
    pub offset: usize,
    pub buffers: Vec<AlignedBuffer<u8>>,
    pub children: Vec<ArrowProxy>,
    pub dictionary: Option<ArrowProxy>,
}

/// Lifetime-owning handle over one `(array, schema)` pair.
pub struct ArrowProxy {
    array: Box<ArrowArray>,
    schema: Box<ArrowSchema>,
}

impl ArrowProxy {
    /// Allocates a fresh array/schema pair that owns everything passed in.
    #[must_use]
    pub fn create_owned(spec: OwnedArraySpec) -> Self {
        let (children_boxes, children_schema_boxes): (Vec<_>, Vec<_>) = spec
            .children
            .into_iter()
            .map(ArrowProxy::transfer_out)
            .map(|(a, s)| (Box::new(a), Box::new(s)))
            .unzip();
        let mut children_ptrs: Vec<*mut ArrowArray> =
            children_boxes.iter().map(|b: &Box<ArrowArray>| {
                let raw: *const ArrowArray = b.as_ref();
                raw as *mut ArrowArray
            }).collect();
        let mut children_schema_ptrs: Vec<*mut ArrowSchema> = children_schema_boxes
            .iter()
            .map(|b: &Box<ArrowSchema>| {
                let raw: *const ArrowSchema = b.as_ref();
                raw as *mut ArrowSchema
            })
            .collect();

        let (dict_array_box, dict_schema_box) = match spec.dictionary {
            Some(proxy) => {
                let (a, s) = proxy.transfer_out();
                (Some(Box::new(a)), Some(Box::new(s)))
            }
            None => (None, None),
        };

        let mut buffer_ptrs: Vec<*const c_void> = spec
            .buffers
            .iter()
            .map(|b| b.data() as *const c_void)
            .collect();

        let format = CString::new(spec.format).expect("format string must not contain NUL");
        let name = spec
            .name
            .map(|n| CString::new(n).expect("name must not contain NUL"));
        let metadata = spec.metadata.as_deref().map(encode_metadata);

        let array_n_children = children_ptrs.len() as i64;
        let schema_n_children = children_schema_ptrs.len() as i64;

        let dict_array_ptr = dict_array_box
            .as_ref()
            .map(|b: &Box<ArrowArray>| b.as_ref() as *const ArrowArray as *mut ArrowArray)
            .unwrap_or(std::ptr::null_mut());
        let dict_schema_ptr = dict_schema_box
            .as_ref()
            .map(|b: &Box<ArrowSchema>| b.as_ref() as *const ArrowSchema as *mut ArrowSchema)
            .unwrap_or(std::ptr::null_mut());

        let array_private = Box::new(OwnedArrayPrivate {
            buffers: spec.buffers,
            buffer_ptrs,
            children: children_boxes,
            children_ptrs: std::mem::take(&mut children_ptrs),
            dictionary: dict_array_box,
        });
        let schema_private = Box::new(OwnedSchemaPrivate {
            format,
            name,
            metadata,
            children: children_schema_boxes,
            children_ptrs: std::mem::take(&mut children_schema_ptrs),
            dictionary: dict_schema_box,
        });

        let array_private_ptr = Box::into_raw(array_private);
        let schema_private_ptr = Box::into_raw(schema_private);

        let array = unsafe {
            Box::new(ArrowArray {
                length: spec.length as i64,
                null_count: spec.null_count,
                offset: spec.offset as i64,
                n_buffers: (*array_private_ptr).buffer_ptrs.len() as i64,
                n_children: array_n_children,
                buffers: (*array_private_ptr).buffer_ptrs.as_mut_ptr(),
                children: (*array_private_ptr).children_ptrs.as_mut_ptr(),
                dictionary: dict_array_ptr,
                release: Some(release_owned_array),
                private_data: array_private_ptr as *mut c_void,
            })
        };
        let schema = unsafe {
            Box::new(ArrowSchema {
                format: (*schema_private_ptr).format.as_ptr(),
                name: (*schema_private_ptr)
                    .name
                    .as_ref()
                    .map(|n| n.as_ptr())
                    .unwrap_or(std::ptr::null()),
                metadata: (*schema_private_ptr)
                    .metadata
                    .as_ref()
                    .map(|m| m.as_ptr() as *const std::os::raw::c_char)
                    .unwrap_or(std::ptr::null()),
                flags: spec.flags,
                n_children: schema_n_children,
                children: (*schema_private_ptr).children_ptrs.as_mut_ptr(),
                dictionary: dict_schema_ptr,
                release: Some(release_owned_schema),
                private_data: schema_private_ptr as *mut c_void,
            })
        };

        Self { array, schema }
    }

    /// Moves the content of two externally-owned structs into freshly
    /// boxed copies, taking over release responsibility. The source
    /// structs' `release` fields are nulled, so the original owner must not
    /// call them again.
    ///
    /// # Safety
    /// `array` and `schema` must each point to a live, unreleased,
    /// correctly paired C Data Interface struct.
    #[must_use]
    pub unsafe fn adopt_foreign(array: *mut ArrowArray, schema: *mut ArrowSchema) -> Self {
        let array_val = std::ptr::read(array);
        let schema_val = std::ptr::read(schema);
        (*array).release = None;
        (*schema).release = None;
        Self {
            array: Box::new(array_val),
            schema: Box::new(schema_val),
        }
    }

    /// Relinquishes both structs to the caller by value. `self` is
    /// consumed, so no further operations on it are possible.
    #[must_use]
    pub fn transfer_out(self) -> (ArrowArray, ArrowSchema) {
        (*self.array, *self.schema)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.array.length as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.array.offset as usize
    }

    /// Returns the stored null count, or recomputes it from buffer 0 (the
    /// validity bitmap) if it is [`NULL_COUNT_UNKNOWN`] and a bitmap buffer
    /// is present.
    #[must_use]
    pub fn null_count(&self) -> i64 {
        if self.array.null_count != NULL_COUNT_UNKNOWN {
            return self.array.null_count;
        }
        if self.array.n_buffers == 0 {
            return 0;
        }
        let ptr = unsafe { *self.array.buffers } as *const u8;
        if ptr.is_null() {
            return 0;
        }
        let byte_len = (self.len() + 7) / 8;
        let bytes = unsafe { std::slice::from_raw_parts(ptr, byte_len) };
        let set = bytes
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let bits_here = (self.len() - i * 8).min(8);
                (0..bits_here).filter(|bit| (b >> bit) & 1 != 0).count()
            })
            .sum::<usize>();
        (self.len() - set) as i64
    }

    pub fn format(&self) -> Result<&str> {
        unsafe { CStr::from_ptr(self.schema.format) }
            .to_str()
            .map_err(|_| Error::format_mismatch("schema format string is not valid UTF-8"))
    }

    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_format(self.format()?)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if self.schema.name.is_null() {
            None
        } else {
            unsafe { CStr::from_ptr(self.schema.name) }.to_str().ok()
        }
    }

    #[must_use]
    pub fn metadata(&self) -> Option<Vec<(Vec<u8>, Vec<u8>)>> {
        if self.schema.metadata.is_null() {
            return None;
        }
        Some(unsafe { crate::ffi::decode_metadata_from_ptr(self.schema.metadata as *const u8) })
    }

    #[must_use]
    pub fn flags(&self) -> i64 {
        self.schema.flags
    }

    #[must_use]
    pub fn n_buffers(&self) -> usize {
        self.array.n_buffers as usize
    }

    /// # Panics
    /// Panics if `index >= n_buffers()`.
    #[must_use]
    pub fn buffer_ptr(&self, index: usize) -> *const u8 {
        assert!(index < self.n_buffers());
        unsafe { *self.array.buffers.add(index) as *const u8 }
    }

    #[must_use]
    pub fn n_children(&self) -> usize {
        self.array.n_children as usize
    }

    /// # Panics
    /// Panics if `index >= n_children()`.
    #[must_use]
    pub fn child_view(&self, index: usize) -> ArrowProxyView<'_> {
        assert!(index < self.n_children());
        unsafe {
            let array = &**self.array.children.add(index);
            let schema = &**self.schema.children.add(index);
            ArrowProxyView { array, schema }
        }
    }

    #[must_use]
    pub fn has_dictionary(&self) -> bool {
        !self.array.dictionary.is_null()
    }

    #[must_use]
    pub fn dictionary_view(&self) -> Option<ArrowProxyView<'_>> {
        self.has_dictionary().then(|| unsafe {
            ArrowProxyView {
                array: &*self.array.dictionary,
                schema: &*self.schema.dictionary,
            }
        })
    }

    #[must_use]
    pub fn view(&self) -> ArrowProxyView<'_> {
        ArrowProxyView {
            array: &self.array,
            schema: &self.schema,
        }
    }

    /// Mutable access to buffer `index`'s owned storage, for layouts that
    /// grow/shrink their own buffers in place (push/insert/erase).
    ///
    /// # Panics
    /// Panics if this proxy was not built via [`ArrowProxy::create_owned`],
    /// or if `index` is out of range.
    pub fn buffer_mut(&mut self, index: usize) -> &mut AlignedBuffer<u8> {
        let private = unsafe {
            (self.array.private_data as *mut OwnedArrayPrivate)
                .as_mut()
                .expect("buffer_mut requires a proxy-owned array")
        };
        &mut private.buffers[index]
    }

    /// Refreshes the cached buffer pointer array after in-place buffer
    /// growth may have reallocated storage. Idempotent: cheap no-op when
    /// addresses have not changed, a no-op entirely for non-owned proxies.
    pub fn update_buffers(&mut self) {
        let Some(private) = (unsafe { (self.array.private_data as *mut OwnedArrayPrivate).as_mut() }) else {
            return;
        };
        for (i, buf) in private.buffers.iter().enumerate() {
            let new_ptr = buf.data() as *const c_void;
            if private.buffer_ptrs[i] != new_ptr {
                tracing::trace!(index = i, "buffer base pointer moved; refreshing proxy cache");
                private.buffer_ptrs[i] = new_ptr;
            }
        }
        self.array.buffers = private.buffer_ptrs.as_mut_ptr();
    }

    /// Updates the logical length and, if known, the null count.
    ///
    /// # Panics
    /// Panics if this proxy was not built via [`ArrowProxy::create_owned`].
    pub fn set_length(&mut self, length: usize, null_count: i64) {
        assert!(
            !self.array.private_data.is_null(),
            "set_length requires a proxy-owned array"
        );
        self.array.length = length as i64;
        self.array.null_count = null_count;
    }
}

/// A non-owning, read-only view into an `(array, schema)` pair, used to
/// navigate children and dictionaries without taking on release
/// responsibility — the owning [`ArrowProxy`] at the root of the tree
/// already does that.
#[derive(Clone, Copy)]
pub struct ArrowProxyView<'a> {
    array: &'a ArrowArray,
    schema: &'a ArrowSchema,
}

impl<'a> ArrowProxyView<'a> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.array.length as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.array.offset as usize
    }

    #[must_use]
    pub fn null_count(&self) -> i64 {
        self.array.null_count
    }

    pub fn format(&self) -> Result<&'a str> {
        unsafe { CStr::from_ptr(self.schema.format) }
            .to_str()
            .map_err(|_| Error::format_mismatch("schema format string is not valid UTF-8"))
    }

    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_format(self.format()?)
    }

    #[must_use]
    pub fn name(&self) -> Option<&'a str> {
        if self.schema.name.is_null() {
            None
        } else {
            unsafe { CStr::from_ptr(self.schema.name) }.to_str().ok()
        }
    }

    #[must_use]
    pub fn metadata(&self) -> Option<Vec<(Vec<u8>, Vec<u8>)>> {
        if self.schema.metadata.is_null() {
            return None;
        }
        Some(unsafe { crate::ffi::decode_metadata_from_ptr(self.schema.metadata as *const u8) })
    }

    #[must_use]
    pub fn flags(&self) -> i64 {
        self.schema.flags
    }

    #[must_use]
    pub fn n_buffers(&self) -> usize {
        self.array.n_buffers as usize
    }

    /// # Panics
    /// Panics if `index >= n_buffers()`.
    #[must_use]
    pub fn buffer_ptr(&self, index: usize) -> *const u8 {
        assert!(index < self.n_buffers());
        unsafe { *self.array.buffers.add(index) as *const u8 }
    }

    #[must_use]
    pub fn n_children(&self) -> usize {
        self.array.n_children as usize
    }

    /// # Panics
    /// Panics if `index >= n_children()`.
    #[must_use]
    pub fn child(&self, index: usize) -> ArrowProxyView<'a> {
        assert!(index < self.n_children());
        unsafe {
            ArrowProxyView {
                array: &**self.array.children.add(index),
                schema: &**self.schema.children.add(index),
            }
        }
    }

    #[must_use]
    pub fn has_dictionary(&self) -> bool {
        !self.array.dictionary.is_null()
    }

    #[must_use]
    pub fn dictionary(&self) -> Option<ArrowProxyView<'a>> {
        self.has_dictionary().then(|| unsafe {
            ArrowProxyView {
                array: &*self.array.dictionary,
                schema: &*self.schema.dictionary,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_i32(values: &[i32], validity: Option<&[bool]>) -> ArrowProxy {
        let mut data: AlignedBuffer<u8> = AlignedBuffer::new();
        data.extend_from_slice(bytemuck::cast_slice(values));
        let mut buffers = Vec::new();
        let null_count;
        if let Some(bits) = validity {
            let bm = crate::bitmap::Bitmap::from_iter(bits.iter().copied());
            null_count = bm.count_unset() as i64;
            buffers.push(AlignedBuffer::from_slice(bm.as_bytes()));
        } else {
            null_count = 0;
            buffers.push(AlignedBuffer::new());
        }
        buffers.push(data);
        ArrowProxy::create_owned(OwnedArraySpec {
            format: "i".to_string(),
            name: Some("col".to_string()),
            metadata: None,
            flags: 2,
            length: values.len(),
            null_count,
            offset: 0,
            buffers,
            children: vec![],
            dictionary: None,
        })
    }

    #[test]
    fn create_owned_round_trips_basic_fields() {
        let proxy = leaf_i32(&[1, 2, 3], None);
        assert_eq!(proxy.len(), 3);
        assert_eq!(proxy.data_type().unwrap(), DataType::Int32);
        assert_eq!(proxy.name(), Some("col"));
        assert_eq!(proxy.null_count(), 0);
    }

    #[test]
    fn transfer_out_then_adopt_foreign_preserves_data() {
        let proxy = leaf_i32(&[10, 20, 30], Some(&[true, false, true]));
        let (mut array, mut schema) = proxy.transfer_out();
        let adopted = unsafe { ArrowProxy::adopt_foreign(&mut array, &mut schema) };
        assert_eq!(adopted.len(), 3);
        assert_eq!(adopted.null_count(), 1);
        assert_eq!(adopted.data_type().unwrap(), DataType::Int32);
        // Source structs were marked spent; dropping them here must not
        // double-release the data the adopted proxy now owns.
        assert!(array.is_released());
        assert!(schema.is_released());
    }

    #[test]
    fn update_buffers_reflects_growth() {
        let mut proxy = leaf_i32(&[1, 2], None);
        proxy.buffer_mut(1).push(0);
        proxy.buffer_mut(1).push(0);
        proxy.buffer_mut(1).push(0);
        proxy.buffer_mut(1).push(0);
        proxy.update_buffers();
        let ptr = proxy.buffer_ptr(1);
        assert!(!ptr.is_null());
    }

    #[test]
    fn nested_children_release_recursively() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let mut child_data: AlignedBuffer<u8> = AlignedBuffer::new();
        child_data.extend_from_slice(bytemuck::cast_slice(&[1i32, 2]));
        let mut raw = vec![0u8; 4];
        let raw_ptr = raw.as_mut_ptr();
        std::mem::forget(raw);
        let foreign_buf = unsafe {
            AlignedBuffer::<u8>::from_foreign(
                raw_ptr,
                4,
                Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
            )
        };
        let child = ArrowProxy::create_owned(OwnedArraySpec {
            format: "i".into(),
            name: None,
            metadata: None,
            flags: 0,
            length: 1,
            null_count: 0,
            offset: 0,
            buffers: vec![AlignedBuffer::new(), foreign_buf],
            children: vec![],
            dictionary: None,
        });
        let parent = ArrowProxy::create_owned(OwnedArraySpec {
            format: "+s".into(),
            name: None,
            metadata: None,
            flags: 0,
            length: 1,
            null_count: 0,
            offset: 0,
            buffers: vec![AlignedBuffer::new()],
            children: vec![child],
            dictionary: None,
        });
        assert_eq!(parent.n_children(), 1);
        drop(parent);
        assert!(released.load(Ordering::SeqCst));
    }
}
