//! Fixed-width binary layout: every element occupies exactly `width` bytes
//! in a single flat data buffer, at byte offset `index * width`. No offsets
//! buffer; `width` itself lives in the format string (`w:<width>`).

use crate::array::{check_index, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::OwnedArraySpec;
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

pub struct FixedSizeBinaryArray {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    width: usize,
}

impl FixedSizeBinaryArray {
    /// Builds from a range of `Nullable<Vec<u8>>`; every present element
    /// must be exactly `width` bytes.
    pub fn from_nullables(
        width: usize,
        items: impl IntoIterator<Item = Nullable<Vec<u8>>>,
    ) -> Result<Self> {
        let items: Vec<Nullable<Vec<u8>>> = items.into_iter().collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        let mut data = vec![0u8; items.len() * width];
        for (i, item) in items.iter().enumerate() {
            if let Some(bytes) = item.as_option() {
                if bytes.len() != width {
                    return Err(Error::invariant(format!(
                        "element {i} has length {}, expected {width}",
                        bytes.len()
                    )));
                }
                data[i * width..(i + 1) * width].copy_from_slice(bytes);
            }
        }
        Ok(Self::build(width, items.len(), Some(validity), &data))
    }

    fn build(width: usize, len: usize, validity: Option<Vec<bool>>, data: &[u8]) -> Self {
        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let data_buf = AlignedBuffer::from_slice(data);
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::FixedSizeBinary(width as i32).format_string(),
            name: None,
            metadata: None,
            flags: 2,
            length: len,
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf, data_buf],
            children: vec![],
            dictionary: None,
        });
        Self {
            proxy,
            bitmap,
            width,
        }
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let width = match proxy.data_type()? {
            DataType::FixedSizeBinary(w) => w as usize,
            other => return Err(Error::format_mismatch(format!("expected fixed-size binary, found {other:?}"))),
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

    fn data(&self) -> &[u8] {
        let ptr = self.proxy.buffer_ptr(1);
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len() * self.width) }
        }
    }

    pub fn at(&self, index: usize) -> Result<Nullable<Vec<u8>>> {
        check_index(index, self.len())?;
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        if !present {
            return Ok(Nullable::none());
        }
        let data = self.data();
        Ok(Nullable::some(
            data[index * self.width..(index + 1) * self.width].to_vec(),
        ))
    }

    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<Vec<u8>> {
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        if !present {
            return Nullable::none();
        }
        let data = self.data();
        Nullable::some(data[index * self.width..(index + 1) * self.width].to_vec())
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for FixedSizeBinaryArray {
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

    #[test]
    fn rejects_mismatched_width() {
        let err = FixedSizeBinaryArray::from_nullables(4, [Nullable::some(vec![1, 2, 3])]);
        assert!(err.is_err());
    }

    #[test]
    fn round_trip_fixed_width_elements() {
        let arr = FixedSizeBinaryArray::from_nullables(
            3,
            [
                Nullable::some(vec![1, 2, 3]),
                Nullable::none(),
                Nullable::some(vec![9, 9, 9]),
            ],
        )
        .unwrap();
        assert_eq!(arr.width(), 3);
        assert_eq!(arr.at(0).unwrap().into_value().unwrap(), vec![1, 2, 3]);
        assert!(arr.at(1).unwrap().is_null());
        assert_eq!(arr.at(2).unwrap().into_value().unwrap(), vec![9, 9, 9]);
    }

    #[test]
    fn proxy_round_trip_preserves_width() {
        let arr = FixedSizeBinaryArray::from_nullables(2, [Nullable::some(vec![5, 6])]).unwrap();
        let proxy = arr.into_proxy();
        let back = FixedSizeBinaryArray::from_proxy(proxy).unwrap();
        assert_eq!(back.width(), 2);
        assert_eq!(back.at(0).unwrap().into_value().unwrap(), vec![5, 6]);
    }

    #[test]
    fn get_unchecked_matches_checked_access() {
        let arr =
            FixedSizeBinaryArray::from_nullables(2, [Nullable::some(vec![1, 2]), Nullable::none()]).unwrap();
        unsafe {
            assert_eq!(arr.get_unchecked(0), arr.at(0).unwrap());
            assert_eq!(arr.get_unchecked(1), arr.at(1).unwrap());
        }
    }
}
