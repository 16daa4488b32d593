//! List-view and large-list-view layouts: like [`crate::array::list`] but
//! with independent `offsets`/`sizes` buffers of `N` entries each instead of
//! one shared `N + 1` offsets buffer, so child ranges may overlap or appear
//! out of order (the whole point of the view variant).

use crate::array::{check_index, read_validity_bitmap, Array, OffsetWidth};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;

fn list_view_format<O: OffsetWidth>() -> String {
    if std::mem::size_of::<O>() == 8 {
        DataType::LargeListView.format_string()
    } else {
        DataType::ListView.format_string()
    }
}

pub struct ListViewArray<O: OffsetWidth> {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    _marker: std::marker::PhantomData<O>,
}

impl<O: OffsetWidth> ListViewArray<O> {
    /// Builds from explicit, independently supplied `(offset, size)` pairs;
    /// unlike [`crate::array::list::ListArray`] these need not be
    /// monotonic or contiguous.
    pub fn new(
        ranges: &[(usize, usize)],
        validity: Option<Vec<bool>>,
        child: ArrowProxy,
    ) -> Result<Self> {
        for &(start, size) in ranges {
            if start + size > child.len() {
                return Err(Error::invariant(format!(
                    "range [{start}, {}) exceeds child length {}",
                    start + size,
                    child.len()
                )));
            }
        }
        let mut offsets: Vec<O> = Vec::with_capacity(ranges.len());
        let mut sizes: Vec<O> = Vec::with_capacity(ranges.len());
        for &(start, size) in ranges {
            offsets.push(O::try_from(start as i64).map_err(|_| Error::invariant("offset overflow"))?);
            sizes.push(O::try_from(size as i64).map_err(|_| Error::invariant("size overflow"))?);
        }

        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let offsets_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(&offsets));
        let sizes_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(&sizes));

        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: list_view_format::<O>(),
            name: None,
            metadata: None,
            flags: 2,
            length: ranges.len(),
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf, offsets_buf, sizes_buf],
            children: vec![child],
            dictionary: None,
        });
        Ok(Self {
            proxy,
            bitmap,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let expected = list_view_format::<O>();
        if proxy.format()? != expected {
            return Err(Error::format_mismatch(format!(
                "expected format '{expected}', found '{}'",
                proxy.format()?
            )));
        }
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        Ok(Self {
            proxy,
            bitmap,
            _marker: std::marker::PhantomData,
        })
    }

    fn offsets(&self) -> &[O] {
        let ptr = self.proxy.buffer_ptr(1) as *const O;
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len()) }
        }
    }

    fn sizes(&self) -> &[O] {
        let ptr = self.proxy.buffer_ptr(2) as *const O;
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len()) }
        }
    }

    pub fn value_range(&self, index: usize) -> Result<(usize, usize)> {
        check_index(index, self.len())?;
        let start: i64 = self.offsets()[index].into();
        let size: i64 = self.sizes()[index].into();
        Ok((start as usize, (start + size) as usize))
    }

    /// # Safety
    /// `index` must be `< len()`.
    #[must_use]
    pub unsafe fn value_range_unchecked(&self, index: usize) -> (usize, usize) {
        let start: i64 = self.offsets()[index].into();
        let size: i64 = self.sizes()[index].into();
        (start as usize, (start + size) as usize)
    }

    #[must_use]
    pub fn child(&self) -> ArrowProxyView<'_> {
        self.proxy.child_view(0)
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl<O: OffsetWidth> Array for ListViewArray<O> {
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
