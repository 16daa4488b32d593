//! Dictionary-encoded layout: an ordinary integer index array whose schema
//! carries a non-null `dictionary` pointer at the values array, per the C
//! Data Interface convention described in [`crate::datatype`] — dictionary
//! encoding is not its own format string, it is the index type's format
//! string plus that out-of-band pointer.

use crate::array::primitive::NativeType;
use crate::array::{check_index, check_validity_buffer_presence, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

pub struct DictionaryArray<I: NativeType + Into<i64>> {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    _marker: std::marker::PhantomData<I>,
}

impl<I: NativeType + Into<i64>> DictionaryArray<I> {
    /// Builds from a range of nullable indices over `dictionary`'s values;
    /// every present index must be `< dictionary.len()`.
    pub fn new(indices: impl IntoIterator<Item = Nullable<I>>, dictionary: ArrowProxy) -> Result<Self> {
        let items: Vec<Nullable<I>> = indices.into_iter().collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        for (i, item) in items.iter().enumerate() {
            if let Some(&idx) = item.as_option() {
                let idx: i64 = idx.into();
                if idx < 0 || idx as usize >= dictionary.len() {
                    return Err(Error::invariant(format!(
                        "index {idx} at element {i} is out of range for a dictionary of {} values",
                        dictionary.len()
                    )));
                }
            }
        }
        let values: Vec<I> = items.iter().map(|n| n.as_option().copied().unwrap_or_default()).collect();

        let bitmap = Bitmap::from_iter(validity);
        let null_count = bitmap.count_unset() as i64;
        let bitmap_buf = AlignedBuffer::from_slice(bitmap.as_bytes());
        let data_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(&values));

        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: I::data_type().format_string(),
            name: None,
            metadata: None,
            flags: 2,
            length: items.len(),
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf, data_buf],
            children: vec![],
            dictionary: Some(dictionary),
        });
        Ok(Self {
            proxy,
            bitmap: Some(bitmap),
            _marker: std::marker::PhantomData,
        })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        if !proxy.has_dictionary() {
            return Err(Error::format_mismatch("array has no dictionary pointer"));
        }
        let dt = proxy.data_type()?;
        if dt != I::data_type() {
            return Err(Error::format_mismatch(format!(
                "expected index type {:?}, found {dt:?}",
                I::data_type()
            )));
        }
        check_validity_buffer_presence(&proxy, &dt)?;
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        Ok(Self {
            proxy,
            bitmap,
            _marker: std::marker::PhantomData,
        })
    }

    fn indices(&self) -> &[I] {
        let ptr = self.proxy.buffer_ptr(1) as *const I;
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len()) }
        }
    }

    /// The dictionary index backing element `index`, or `None` if it is
    /// null.
    pub fn index_at(&self, index: usize) -> Result<Nullable<I>> {
        check_index(index, self.len())?;
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Ok(Nullable::from_parts(self.indices()[index], present))
    }

    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn index_at_unchecked(&self, index: usize) -> Nullable<I> {
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Nullable::from_parts(*self.indices().get_unchecked(index), present)
    }

    #[must_use]
    pub fn dictionary(&self) -> ArrowProxyView<'_> {
        self.proxy
            .dictionary_view()
            .expect("construction guarantees a dictionary is always attached")
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl<I: NativeType + Into<i64>> Array for DictionaryArray<I> {
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
    use crate::array::variable_binary::Utf8Array;

    #[test]
    fn resolves_indices_against_dictionary_values() {
        let dict = Utf8Array::<i32>::from_values(["red".to_string(), "green".to_string(), "blue".to_string()])
            .into_proxy();
        let arr = DictionaryArray::<i32>::new(
            [Nullable::some(2), Nullable::none(), Nullable::some(0)],
            dict,
        )
        .unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.null_count(), 1);
        assert_eq!(arr.index_at(0).unwrap().into_value().unwrap(), 2);
        assert!(arr.index_at(1).unwrap().is_null());
        assert_eq!(arr.dictionary().len(), 3);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let dict = PrimitiveArray::<i32>::from_values([1, 2]).into_proxy();
        assert!(DictionaryArray::<i32>::new([Nullable::some(5)], dict).is_err());
    }

    #[test]
    fn index_at_unchecked_matches_checked_access() {
        let dict = PrimitiveArray::<i32>::from_values([1, 2, 3]).into_proxy();
        let arr = DictionaryArray::<i32>::new([Nullable::some(1), Nullable::none()], dict).unwrap();
        unsafe {
            assert_eq!(arr.index_at_unchecked(0), arr.index_at(0).unwrap());
            assert_eq!(arr.index_at_unchecked(1), arr.index_at(1).unwrap());
        }
    }
}
