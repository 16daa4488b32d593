//! Binary-view and UTF-8-view layouts: a fixed 16-byte "view" per element
//! (4-byte length, then either 12 inline data bytes for elements of length
//! `<= 12`, or a 4-byte prefix plus a buffer index and offset into one of
//! the variadic data buffers). A trailing buffer records each variadic
//! buffer's byte length, so a consumer can bounds-check without rescanning
//! every view.

use crate::array::{check_index, check_validity_buffer_presence, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::OwnedArraySpec;
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

const VIEW_WIDTH: usize = 16;
const INLINE_THRESHOLD: usize = 12;
const PREFIX_LEN: usize = 4;

fn encode_view(bytes: &[u8], buffer_index: i32, buffer_offset: i32) -> [u8; VIEW_WIDTH] {
    let mut view = [0u8; VIEW_WIDTH];
    view[0..4].copy_from_slice(&(bytes.len() as i32).to_le_bytes());
    if bytes.len() <= INLINE_THRESHOLD {
        view[4..4 + bytes.len()].copy_from_slice(bytes);
    } else {
        view[4..4 + PREFIX_LEN].copy_from_slice(&bytes[0..PREFIX_LEN]);
        view[8..12].copy_from_slice(&buffer_index.to_le_bytes());
        view[12..16].copy_from_slice(&buffer_offset.to_le_bytes());
    }
    view
}

fn view_length(view: &[u8]) -> usize {
    i32::from_le_bytes(view[0..4].try_into().unwrap()) as usize
}

/// Builds the variadic data buffers and per-element views for a batch of
/// byte strings: every element lands in one flat variadic buffer (buffer
/// index 0), since a single construction pass has no reason to split
/// across several.
fn build_views_and_data(values: &[&[u8]]) -> (Vec<[u8; VIEW_WIDTH]>, Vec<u8>) {
    let mut data = Vec::new();
    let views = values
        .iter()
        .map(|bytes| {
            if bytes.len() <= INLINE_THRESHOLD {
                encode_view(bytes, 0, 0)
            } else {
                let offset = data.len() as i32;
                data.extend_from_slice(bytes);
                encode_view(bytes, 0, offset)
            }
        })
        .collect();
    (views, data)
}

pub struct BinaryViewArray {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
}

impl BinaryViewArray {
    pub fn from_nullables(items: impl IntoIterator<Item = Nullable<Vec<u8>>>) -> Self {
        let items: Vec<Nullable<Vec<u8>>> = items.into_iter().collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        let empty = Vec::new();
        let byte_refs: Vec<&[u8]> = items
            .iter()
            .map(|n| n.as_option().map_or(empty.as_slice(), |v| v.as_slice()))
            .collect();
        Self::build(Some(validity), &byte_refs, DataType::BinaryView)
    }

    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let values: Vec<Vec<u8>> = values.into_iter().collect();
        let byte_refs: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
        Self::build(None, &byte_refs, DataType::BinaryView)
    }

    fn build(validity: Option<Vec<bool>>, values: &[&[u8]], format: DataType) -> Self {
        let (views, data) = build_views_and_data(values);
        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let views_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(&views));
        let data_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(&data);
        let sizes_buf: AlignedBuffer<u8> =
            AlignedBuffer::from_slice(bytemuck::cast_slice(&[data.len() as i64]));
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: format.format_string(),
            name: None,
            metadata: None,
            flags: 2,
            length: values.len(),
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf, views_buf, data_buf, sizes_buf],
            children: vec![],
            dictionary: None,
        });
        Self { proxy, bitmap }
    }

    fn views(&self) -> &[u8] {
        let ptr = self.proxy.buffer_ptr(1);
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len() * VIEW_WIDTH) }
        }
    }

    fn variadic_buffer(&self, index: usize) -> &[u8] {
        let n_variadic = self.proxy.n_buffers() - 3;
        assert!(index < n_variadic, "variadic buffer index out of range");
        let ptr = self.proxy.buffer_ptr(2 + index);
        let size_ptr = self.proxy.buffer_ptr(self.proxy.n_buffers() - 1) as *const i64;
        let size = unsafe { *size_ptr.add(index) } as usize;
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, size) }
        }
    }

    fn resolve(&self, index: usize) -> &[u8] {
        let view = &self.views()[index * VIEW_WIDTH..(index + 1) * VIEW_WIDTH];
        let len = view_length(view);
        if len <= INLINE_THRESHOLD {
            &view[PREFIX_LEN..PREFIX_LEN + len]
        } else {
            let buffer_index = i32::from_le_bytes(view[8..12].try_into().unwrap()) as usize;
            let offset = i32::from_le_bytes(view[12..16].try_into().unwrap()) as usize;
            &self.variadic_buffer(buffer_index)[offset..offset + len]
        }
    }

    pub fn at(&self, index: usize) -> Result<Nullable<Vec<u8>>> {
        check_index(index, self.len())?;
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        if !present {
            return Ok(Nullable::none());
        }
        Ok(Nullable::some(self.resolve(index).to_vec()))
    }

    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<Vec<u8>> {
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        if !present {
            return Nullable::none();
        }
        Nullable::some(self.resolve(index).to_vec())
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let dt = proxy.data_type()?;
        if dt != DataType::BinaryView {
            return Err(Error::format_mismatch(format!("expected binary view, found {dt:?}")));
        }
        check_validity_buffer_presence(&proxy, &dt)?;
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        Ok(Self { proxy, bitmap })
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for BinaryViewArray {
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

/// A [`BinaryViewArray`] whose every present element is validated UTF-8 at
/// construction time.
pub struct Utf8ViewArray {
    inner: BinaryViewArray,
}

impl Utf8ViewArray {
    pub fn from_nullables(items: impl IntoIterator<Item = Nullable<String>>) -> Self {
        let items: Vec<Nullable<Vec<u8>>> = items
            .into_iter()
            .map(|n| n.map(String::into_bytes))
            .collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        let empty = Vec::new();
        let byte_refs: Vec<&[u8]> = items
            .iter()
            .map(|n| n.as_option().map_or(empty.as_slice(), |v| v.as_slice()))
            .collect();
        Self {
            inner: BinaryViewArray::build(Some(validity), &byte_refs, DataType::Utf8View),
        }
    }

    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = String>) -> Self {
        let values: Vec<String> = values.into_iter().collect();
        let byte_refs: Vec<&[u8]> = values.iter().map(String::as_bytes).collect();
        Self {
            inner: BinaryViewArray::build(None, &byte_refs, DataType::Utf8View),
        }
    }

    pub fn at(&self, index: usize) -> Result<Nullable<String>> {
        let raw = self.inner.at(index)?;
        Ok(match raw.into_option() {
            Some(bytes) => Nullable::some(
                String::from_utf8(bytes).map_err(|_| Error::invariant("stored bytes are not valid utf-8"))?,
            ),
            None => Nullable::none(),
        })
    }

    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<String> {
        match self.inner.get_unchecked(index).into_option() {
            Some(bytes) => Nullable::some(String::from_utf8_unchecked(bytes)),
            None => Nullable::none(),
        }
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let dt = proxy.data_type()?;
        if dt != DataType::Utf8View {
            return Err(Error::format_mismatch(format!("expected utf-8 view, found {dt:?}")));
        }
        check_validity_buffer_presence(&proxy, &dt)?;
        Ok(Self {
            inner: BinaryViewArray {
                proxy,
                bitmap: None,
            }
            .reload_bitmap(),
        })
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.inner.into_proxy()
    }
}

impl BinaryViewArray {
    fn reload_bitmap(mut self) -> Self {
        let len = self.proxy.len();
        self.bitmap = read_validity_bitmap(&self.proxy, len);
        self
    }
}

impl Array for Utf8ViewArray {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn null_count(&self) -> i64 {
        self.inner.null_count()
    }

    fn is_valid(&self, index: usize) -> bool {
        self.inner.is_valid(index)
    }

    fn name(&self) -> Option<&str> {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_are_inlined() {
        let arr = Utf8ViewArray::from_values(["hi".to_string(), "exactly12ch!".to_string()]);
        assert_eq!(arr.at(0).unwrap().into_value().unwrap(), "hi");
        assert_eq!(arr.at(1).unwrap().into_value().unwrap(), "exactly12ch!");
    }

    #[test]
    fn long_strings_spill_to_variadic_buffer() {
        let long = "this value is definitely longer than twelve bytes".to_string();
        let arr = Utf8ViewArray::from_values([long.clone()]);
        assert_eq!(arr.at(0).unwrap().into_value().unwrap(), long);
    }

    #[test]
    fn binary_view_round_trips_with_null() {
        let arr = BinaryViewArray::from_nullables([
            Nullable::some(vec![1, 2, 3]),
            Nullable::none(),
        ]);
        assert_eq!(arr.null_count(), 1);
        assert_eq!(arr.at(0).unwrap().into_value().unwrap(), vec![1, 2, 3]);
        assert!(arr.at(1).unwrap().is_null());
    }

    #[test]
    fn get_unchecked_matches_checked_access() {
        let arr = BinaryViewArray::from_nullables([Nullable::some(vec![9, 9]), Nullable::none()]);
        unsafe {
            assert_eq!(arr.get_unchecked(0), arr.at(0).unwrap());
            assert_eq!(arr.get_unchecked(1), arr.at(1).unwrap());
        }

        let utf8 = Utf8ViewArray::from_nullables([Nullable::some("hi".to_string()), Nullable::none()]);
        unsafe {
            assert_eq!(utf8.get_unchecked(0), utf8.at(0).unwrap());
            assert_eq!(utf8.get_unchecked(1), utf8.at(1).unwrap());
        }
    }
}
