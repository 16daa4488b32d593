//! Variable-size binary and UTF-8 layouts: an offsets buffer of `N + 1`
//! monotonically non-decreasing entries plus a single flat data buffer.
//! Element `i` is the data buffer slice `[offsets[i], offsets[i + 1])`.
//! `Utf8Array`/`BinaryArray` share this shape; `Utf8Array` additionally
//! checks every inserted slice is valid UTF-8 before committing it, since a
//! malformed element there would violate the layout's own invariant, not
//! just the caller's expectations.

use crate::array::{check_index, read_validity_bitmap, Array, OffsetWidth};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::OwnedArraySpec;
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

fn offsets_from_lengths<O: OffsetWidth>(lengths: &[usize]) -> Result<Vec<O>> {
    let mut offsets = Vec::with_capacity(lengths.len() + 1);
    let mut acc: i64 = 0;
    offsets.push(O::try_from(acc).map_err(|_| Error::invariant("offset overflow"))?);
    for &len in lengths {
        acc += len as i64;
        offsets.push(O::try_from(acc).map_err(|_| Error::invariant("offset overflow"))?);
    }
    Ok(offsets)
}

macro_rules! variable_layout {
    ($name:ident, $format_fn:path, $elem:ty, $to_bytes:expr, $from_bytes:expr, $validate:expr) => {
        pub struct $name<O: OffsetWidth> {
            proxy: ArrowProxy,
            bitmap: Option<Bitmap>,
            _marker: std::marker::PhantomData<O>,
        }

        impl<O: OffsetWidth> $name<O> {
            /// Builds from a range of `Nullable<$elem>` items, assigning
            /// each present element's byte length into the offsets array by
            /// prefix sum (nulls contribute a zero-width slice, matching
            /// the "offsets still advance, slice is just empty" convention).
            pub fn from_nullables(items: impl IntoIterator<Item = Nullable<$elem>>) -> Result<Self> {
                let items: Vec<Nullable<$elem>> = items.into_iter().collect();
                let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
                let mut data = Vec::new();
                let mut lengths = Vec::with_capacity(items.len());
                for item in &items {
                    let bytes: &[u8] = match item.as_option() {
                        Some(v) => {
                            let b = ($to_bytes)(v);
                            ($validate)(b)?;
                            b
                        }
                        None => &[],
                    };
                    lengths.push(bytes.len());
                    data.extend_from_slice(bytes);
                }
                let offsets = offsets_from_lengths::<O>(&lengths)?;
                Ok(Self::build(items.len(), Some(validity), &offsets, &data))
            }

            #[must_use]
            pub fn from_values(values: impl IntoIterator<Item = $elem>) -> Self {
                let values: Vec<$elem> = values.into_iter().collect();
                let mut data = Vec::new();
                let lengths: Vec<usize> = values
                    .iter()
                    .map(|v| {
                        let bytes = ($to_bytes)(v);
                        data.extend_from_slice(bytes);
                        bytes.len()
                    })
                    .collect();
                let offsets = offsets_from_lengths::<O>(&lengths).expect("offset overflow");
                Self::build(values.len(), None, &offsets, &data)
            }

            fn build(len: usize, validity: Option<Vec<bool>>, offsets: &[O], data: &[u8]) -> Self {
                let bitmap = validity.map(Bitmap::from_iter);
                let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
                let bitmap_buf = match &bitmap {
                    Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
                    None => AlignedBuffer::new(),
                };
                let offsets_buf: AlignedBuffer<u8> =
                    AlignedBuffer::from_slice(bytemuck::cast_slice(offsets));
                let data_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(data);
                let proxy = ArrowProxy::create_owned(OwnedArraySpec {
                    format: $format_fn::<O>(),
                    name: None,
                    metadata: None,
                    flags: 2,
                    length: len,
                    null_count,
                    offset: 0,
                    buffers: vec![bitmap_buf, offsets_buf, data_buf],
                    children: vec![],
                    dictionary: None,
                });
                Self {
                    proxy,
                    bitmap,
                    _marker: std::marker::PhantomData,
                }
            }

            fn offsets(&self) -> &[O] {
                let ptr = self.proxy.buffer_ptr(1) as *const O;
                if ptr.is_null() {
                    &[]
                } else {
                    unsafe { std::slice::from_raw_parts(ptr, self.len() + 1) }
                }
            }

            fn data(&self) -> &[u8] {
                let ptr = self.proxy.buffer_ptr(2);
                if ptr.is_null() {
                    &[]
                } else {
                    let total: i64 = self.offsets().last().copied().map_or(0, Into::into);
                    unsafe { std::slice::from_raw_parts(ptr, total as usize) }
                }
            }

            fn slice_bytes(&self, index: usize) -> &[u8] {
                let offsets = self.offsets();
                let start: i64 = offsets[index].into();
                let end: i64 = offsets[index + 1].into();
                &self.data()[start as usize..end as usize]
            }

            pub fn at(&self, index: usize) -> Result<Nullable<$elem>> {
                check_index(index, self.len())?;
                let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
                if !present {
                    return Ok(Nullable::none());
                }
                Ok(Nullable::some(($from_bytes)(self.slice_bytes(index))))
            }

            /// # Safety
            /// `index` must be `< len()`.
            pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<$elem> {
                let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
                if !present {
                    return Nullable::none();
                }
                Nullable::some(($from_bytes)(self.slice_bytes(index)))
            }

            /// Replaces element `index` with `new_value`, growing or
            /// shrinking the data buffer and shifting every later offset by
            /// the byte-length delta.
            ///
            /// # Panics
            /// Panics if `index >= len()`.
            pub fn assign(&mut self, index: usize, new_value: $elem) -> Result<()> {
                let len = self.len();
                assert!(index < len, "assign index {index} out of range for length {len}");
                let new_bytes: &[u8] = ($to_bytes)(&new_value);
                ($validate)(new_bytes)?;

                let mut offsets: Vec<O> = self.offsets().to_vec();
                let mut data: Vec<u8> = self.data().to_vec();

                let start: i64 = offsets[index].into();
                let end: i64 = offsets[index + 1].into();
                let delta = new_bytes.len() as i64 - (end - start);
                data.splice(start as usize..end as usize, new_bytes.iter().copied());
                for offset in &mut offsets[index + 1..] {
                    let shifted = i64::from(*offset) + delta;
                    *offset = O::try_from(shifted).map_err(|_| Error::invariant("offset overflow"))?;
                }

                let offsets_buf = self.proxy.buffer_mut(1);
                offsets_buf.clear();
                offsets_buf.extend_from_slice(bytemuck::cast_slice(&offsets));
                let data_buf = self.proxy.buffer_mut(2);
                data_buf.clear();
                data_buf.extend_from_slice(&data);

                let mut became_non_null = false;
                if let Some(bm) = &mut self.bitmap {
                    if !bm.get(index) {
                        bm.set(index, true);
                        became_non_null = true;
                    }
                }
                if became_non_null || self.bitmap.is_some() {
                    if let Some(bm) = &self.bitmap {
                        let bitmap_buf = self.proxy.buffer_mut(0);
                        bitmap_buf.clear();
                        bitmap_buf.extend_from_slice(bm.as_bytes());
                    }
                }
                let null_count = self.bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
                self.proxy.set_length(len, null_count);
                self.proxy.update_buffers();
                Ok(())
            }

            pub fn into_proxy(self) -> ArrowProxy {
                self.proxy
            }

            pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
                let expected = $format_fn::<O>();
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
        }

        impl<O: OffsetWidth> Array for $name<O> {
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
    };
}

fn utf8_format<O: OffsetWidth>() -> String {
    if std::mem::size_of::<O>() == 8 {
        DataType::LargeUtf8.format_string()
    } else {
        DataType::Utf8.format_string()
    }
}

fn binary_format<O: OffsetWidth>() -> String {
    if std::mem::size_of::<O>() == 8 {
        DataType::LargeBinary.format_string()
    } else {
        DataType::Binary.format_string()
    }
}

variable_layout!(
    Utf8Array,
    utf8_format,
    String,
    |v: &String| v.as_bytes(),
    |b: &[u8]| std::str::from_utf8(b).expect("stored slice was validated as utf-8").to_string(),
    |b: &[u8]| std::str::from_utf8(b)
        .map(|_| ())
        .map_err(|_| Error::invariant("element is not valid utf-8"))
);

variable_layout!(
    BinaryArray,
    binary_format,
    Vec<u8>,
    |v: &Vec<u8>| v.as_slice(),
    |b: &[u8]| b.to_vec(),
    |_b: &[u8]| -> Result<()> { Ok(()) }
);
