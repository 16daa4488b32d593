//! List and large-list layouts: an offsets buffer of `N + 1` entries over a
//! single child array. Element `i` is the child's sub-range
//! `[offsets[i], offsets[i + 1])`. `ListArray<i32>` is `+l`; `ListArray<i64>`
//! (a.k.a. large-list) is `+L`.

use crate::array::{check_index, read_validity_bitmap, Array, OffsetWidth};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;

fn list_format<O: OffsetWidth>() -> String {
    if std::mem::size_of::<O>() == 8 {
        DataType::LargeList.format_string()
    } else {
        DataType::List.format_string()
    }
}

pub struct ListArray<O: OffsetWidth> {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    _marker: std::marker::PhantomData<O>,
}

impl<O: OffsetWidth> ListArray<O> {
    /// Builds a list array over `child`, grouping it into runs of the given
    /// `lengths` (one length per logical element); `validity[i] == false`
    /// marks element `i` as null without changing its (zero-width) range.
    pub fn new(lengths: &[usize], validity: Option<Vec<bool>>, child: ArrowProxy) -> Result<Self> {
        let mut offsets: Vec<O> = Vec::with_capacity(lengths.len() + 1);
        let mut acc: i64 = 0;
        offsets.push(O::try_from(acc).map_err(|_| Error::invariant("offset overflow"))?);
        for &len in lengths {
            acc += len as i64;
            offsets.push(O::try_from(acc).map_err(|_| Error::invariant("offset overflow"))?);
        }
        if acc as usize != child.len() {
            return Err(Error::invariant(format!(
                "list lengths sum to {acc} but child has {} elements",
                child.len()
            )));
        }

        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let offsets_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(&offsets));

        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: list_format::<O>(),
            name: None,
            metadata: None,
            flags: 2,
            length: lengths.len(),
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf, offsets_buf],
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
        let expected = list_format::<O>();
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
            unsafe { std::slice::from_raw_parts(ptr, self.len() + 1) }
        }
    }

    /// The child's `[start, end)` sub-range backing element `index`.
    pub fn value_range(&self, index: usize) -> Result<(usize, usize)> {
        check_index(index, self.len())?;
        let offsets = self.offsets();
        let start: i64 = offsets[index].into();
        let end: i64 = offsets[index + 1].into();
        Ok((start as usize, end as usize))
    }

    /// # Safety
    /// `index` must be `< len()`.
    #[must_use]
    pub unsafe fn value_range_unchecked(&self, index: usize) -> (usize, usize) {
        let offsets = self.offsets();
        let start: i64 = offsets[index].into();
        let end: i64 = offsets[index + 1].into();
        (start as usize, end as usize)
    }

    #[must_use]
    pub fn child(&self) -> ArrowProxyView<'_> {
        self.proxy.child_view(0)
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl<O: OffsetWidth> Array for ListArray<O> {
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
    fn ranges_over_child_follow_prefix_sums() {
        let child = PrimitiveArray::<i32>::from_values([1, 2, 3, 4, 5, 6]).into_proxy();
        let list = ListArray::<i32>::new(&[2, 0, 4], None, child).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.value_range(0).unwrap(), (0, 2));
        assert_eq!(list.value_range(1).unwrap(), (2, 2));
        assert_eq!(list.value_range(2).unwrap(), (2, 6));
    }

    #[test]
    fn mismatched_child_length_is_rejected() {
        let child = PrimitiveArray::<i32>::from_values([1, 2, 3]).into_proxy();
        assert!(ListArray::<i32>::new(&[2, 2], None, child).is_err());
    }

    #[test]
    fn large_list_uses_64_bit_offsets_format() {
        let child = PrimitiveArray::<i32>::from_values([1]).into_proxy();
        let list = ListArray::<i64>::new(&[1], None, child).unwrap();
        let proxy = list.into_proxy();
        assert_eq!(proxy.data_type().unwrap(), DataType::LargeList);
    }

    #[test]
    fn value_range_unchecked_matches_checked_access() {
        let child = PrimitiveArray::<i32>::from_values([1, 2, 3, 4]).into_proxy();
        let list = ListArray::<i32>::new(&[1, 3], None, child).unwrap();
        unsafe {
            assert_eq!(list.value_range_unchecked(0), list.value_range(0).unwrap());
            assert_eq!(list.value_range_unchecked(1), list.value_range(1).unwrap());
        }
    }
}
