//! Fixed-size-list layout: every element is exactly `width` child elements,
//! at child range `[index * width, (index + 1) * width)`. No offsets
//! buffer; `width` lives in the format string (`+w:<width>`).

use crate::array::{check_index, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;

pub struct FixedSizeListArray {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    width: usize,
}

impl FixedSizeListArray {
    pub fn new(width: usize, len: usize, validity: Option<Vec<bool>>, child: ArrowProxy) -> Result<Self> {
        if child.len() != len * width {
            return Err(Error::invariant(format!(
                "child has {} elements, expected {len} * {width} = {}",
                child.len(),
                len * width
            )));
        }
        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::FixedSizeList(width as i32).format_string(),
            name: None,
            metadata: None,
            flags: 2,
            length: len,
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf],
            children: vec![child],
            dictionary: None,
        });
        Ok(Self {
            proxy,
            bitmap,
            width,
        })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let width = match proxy.data_type()? {
            DataType::FixedSizeList(w) => w as usize,
            other => return Err(Error::format_mismatch(format!("expected fixed-size list, found {other:?}"))),
        };
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        Ok(Self {
            proxy,
            bitmap,
            width,
        })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn value_range(&self, index: usize) -> Result<(usize, usize)> {
        check_index(index, self.len())?;
        Ok((index * self.width, (index + 1) * self.width))
    }

    /// # Safety
    /// `index` must be `< len()`.
    #[must_use]
    pub unsafe fn value_range_unchecked(&self, index: usize) -> (usize, usize) {
        (index * self.width, (index + 1) * self.width)
    }

    #[must_use]
    pub fn child(&self) -> ArrowProxyView<'_> {
        self.proxy.child_view(0)
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for FixedSizeListArray {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::primitive::PrimitiveArray;

    #[test]
    fn ranges_are_evenly_spaced() {
        let child = PrimitiveArray::<i32>::from_values([1, 2, 3, 4, 5, 6]).into_proxy();
        let list = FixedSizeListArray::new(3, 2, None, child).unwrap();
        assert_eq!(list.value_range(0).unwrap(), (0, 3));
        assert_eq!(list.value_range(1).unwrap(), (3, 6));
    }

    #[test]
    fn mismatched_child_length_is_rejected() {
        let child = PrimitiveArray::<i32>::from_values([1, 2, 3]).into_proxy();
        assert!(FixedSizeListArray::new(2, 2, None, child).is_err());
    }

    #[test]
    fn value_range_unchecked_matches_checked_access() {
        let child = PrimitiveArray::<i32>::from_values([1, 2, 3, 4]).into_proxy();
        let list = FixedSizeListArray::new(2, 2, None, child).unwrap();
        unsafe {
            assert_eq!(list.value_range_unchecked(0), list.value_range(0).unwrap());
            assert_eq!(list.value_range_unchecked(1), list.value_range(1).unwrap());
        }
    }
}
