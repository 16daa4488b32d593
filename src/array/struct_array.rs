//! Struct layout: no data buffer, only a validity bitmap and `N` children
//! that all share the parent's length. Element `i` is the tuple of
//! `child[i]` over every field; field names live on each child's own
//! schema, set when that child's proxy was built.

use crate::array::{check_validity_buffer_presence, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;

pub struct StructArray {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
}

impl StructArray {
    pub fn new(validity: Option<Vec<bool>>, children: Vec<ArrowProxy>) -> Result<Self> {
        let len = children.first().map_or(0, ArrowProxy::len);
        for child in &children {
            if child.len() != len {
                return Err(Error::invariant(format!(
                    "struct fields have mismatched lengths: {} vs {len}",
                    child.len()
                )));
            }
        }
        if let Some(v) = &validity {
            if v.len() != len {
                return Err(Error::invariant(format!(
                    "validity has {} entries, expected {len}",
                    v.len()
                )));
            }
        }

        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::Struct.format_string(),
            name: None,
            metadata: None,
            flags: 2,
            length: len,
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf],
            children,
            dictionary: None,
        });
        Ok(Self { proxy, bitmap })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let dt = proxy.data_type()?;
        if dt != DataType::Struct {
            return Err(Error::format_mismatch(format!("expected struct, found {dt:?}")));
        }
        check_validity_buffer_presence(&proxy, &dt)?;
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        Ok(Self { proxy, bitmap })
    }

    #[must_use]
    pub fn n_fields(&self) -> usize {
        self.proxy.n_children()
    }

    /// # Panics
    /// Panics if `index >= n_fields()`.
    #[must_use]
    pub fn field(&self, index: usize) -> ArrowProxyView<'_> {
        self.proxy.child_view(index)
    }

    /// # Safety
    /// `index` must be `< len()`.
    #[must_use]
    pub unsafe fn is_valid_unchecked(&self, index: usize) -> bool {
        self.bitmap.as_ref().map_or(true, |bm| bm.get(index))
    }

    #[must_use]
    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.field(index).name()
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for StructArray {
    fn len(&self) -> usize {
        self.proxy.len()
    }

    fn null_count(&self) -> i64 {
        self.proxy.null_count()
    }

    fn is_valid(&self, index: usize) -> bool {
        self.bitmap.as_ref().map_or(true, |bm| bm.get(index))
    }

    fn name(&self) -> Option<&str> {
        self.proxy.name()
    }
}
