//! Decimal128/Decimal256 layout: a fixed-width cell layout like
//! [`crate::array::primitive`], except the cell's byte width is carried by
//! the type parameter (`I128Bytes`/`I256Bytes`) while precision and scale
//! are per-array values baked into the format string at construction time,
//! not into the Rust type.

use bytemuck::Pod;

use crate::array::{check_index, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::decimal::{I128Bytes, I256Bytes};
use crate::error::{Error, Result};
use crate::ffi::proxy::OwnedArraySpec;
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

/// A cell type that can back a decimal array: its byte width is fixed and
/// known at compile time, unlike precision/scale which vary per array.
pub trait DecimalCell: Pod + Default {
    const WIDTH: u16;
}

impl DecimalCell for I128Bytes {
    const WIDTH: u16 = 128;
}

impl DecimalCell for I256Bytes {
    const WIDTH: u16 = 256;
}

pub struct DecimalArray<T: DecimalCell> {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    precision: u8,
    scale: i8,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DecimalCell> DecimalArray<T> {
    #[must_use]
    pub fn from_values(precision: u8, scale: i8, values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<T> = values.into_iter().collect();
        Self::build(precision, scale, values.len(), None, &values)
    }

    #[must_use]
    pub fn from_nullables(
        precision: u8,
        scale: i8,
        items: impl IntoIterator<Item = Nullable<T>>,
    ) -> Self {
        let items: Vec<Nullable<T>> = items.into_iter().collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        let values: Vec<T> = items
            .iter()
            .map(|n| n.as_option().copied().unwrap_or_default())
            .collect();
        Self::build(precision, scale, values.len(), Some(validity), &values)
    }

    fn build(precision: u8, scale: i8, len: usize, validity: Option<Vec<bool>>, values: &[T]) -> Self {
        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let data_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(values));
        let format = DataType::Decimal {
            precision,
            scale,
            width: T::WIDTH,
        }
        .format_string();
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format,
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
            precision,
            scale,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let (precision, scale, width) = match proxy.data_type()? {
            DataType::Decimal {
                precision,
                scale,
                width,
            } => (precision, scale, width),
            other => return Err(Error::format_mismatch(format!("expected decimal, found {other:?}"))),
        };
        if width != T::WIDTH {
            return Err(Error::format_mismatch(format!(
                "decimal array width {width} does not match cell width {}",
                T::WIDTH
            )));
        }
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        Ok(Self {
            proxy,
            bitmap,
            precision,
            scale,
            _marker: std::marker::PhantomData,
        })
    }

    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    #[must_use]
    pub fn scale(&self) -> i8 {
        self.scale
    }

    #[must_use]
    pub fn values(&self) -> &[T] {
        let ptr = self.proxy.buffer_ptr(1) as *const T;
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len()) }
        }
    }

    pub fn at(&self, index: usize) -> Result<Nullable<T>> {
        check_index(index, self.len())?;
        let value = self.values()[index];
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Ok(Nullable::from_parts(value, present))
    }

    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<T> {
        let value = *self.values().get_unchecked(index);
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Nullable::from_parts(value, present)
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl<T: DecimalCell> Array for DecimalArray<T> {
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
    fn decimal128_round_trips_with_one_null() {
        let arr = DecimalArray::<I128Bytes>::from_nullables(
            38,
            10,
            [
                Nullable::some(I128Bytes::new(12345)),
                Nullable::none(),
                Nullable::some(I128Bytes::new(-999)),
            ],
        );
        assert_eq!(arr.precision(), 38);
        assert_eq!(arr.scale(), 10);
        assert_eq!(arr.null_count(), 1);
        assert_eq!(arr.at(0).unwrap().into_value().unwrap().get(), 12345);
        assert!(arr.at(1).unwrap().is_null());
        assert_eq!(arr.at(2).unwrap().into_value().unwrap().get(), -999);
    }

    #[test]
    fn decimal256_preserves_magnitude_beyond_i128() {
        let big = I256Bytes::from_i128(170_141_183_460_469_231_731_687_303_715_884_105_727);
        let arr = DecimalArray::<I256Bytes>::from_values(76, 0, [big]);
        let proxy = arr.into_proxy();
        assert_eq!(
            proxy.data_type().unwrap(),
            DataType::Decimal {
                precision: 76,
                scale: 0,
                width: 256
            }
        );
        let reconstructed = DecimalArray::<I256Bytes>::from_proxy(proxy).unwrap();
        assert_eq!(reconstructed.at(0).unwrap().into_value().unwrap(), big);
    }

    #[test]
    fn mismatched_width_is_rejected_on_adopt() {
        let arr = DecimalArray::<I128Bytes>::from_values(10, 2, [I128Bytes::new(1)]);
        let proxy = arr.into_proxy();
        assert!(DecimalArray::<I256Bytes>::from_proxy(proxy).is_err());
    }

    #[test]
    fn get_unchecked_matches_checked_access() {
        let arr = DecimalArray::<I128Bytes>::from_nullables(
            38,
            10,
            [Nullable::some(I128Bytes::new(7)), Nullable::none()],
        );
        unsafe {
            assert_eq!(arr.get_unchecked(0), arr.at(0).unwrap());
            assert_eq!(arr.get_unchecked(1), arr.at(1).unwrap());
        }
    }
}
