//! Fixed-width cell layout: one data buffer of `N` cells plus an optional
//! validity bitmap. Booleans are bit-packed using the same encoding as the
//! validity bitmap itself; every other native type stores one cell per
//! element in buffer 1 (buffer 0 is always the validity bitmap, per the
//! Arrow buffer-ordering convention `[validity, data, ...]`).

use bytemuck::Pod;

use crate::array::{check_index, check_validity_buffer_presence, read_validity_bitmap, Array};
use crate::bitmap::Bitmap;
use crate::buffer::AlignedBuffer;
use crate::datatype::DataType;
use crate::error::Result;
use crate::ffi::proxy::OwnedArraySpec;
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

/// Maps a Rust native numeric type to its Arrow logical type.
pub trait NativeType: Pod + Default {
    fn data_type() -> DataType;
}

macro_rules! native_type {
    ($t:ty, $dt:expr) => {
        impl NativeType for $t {
            fn data_type() -> DataType {
                $dt
            }
        }
    };
}

native_type!(i8, DataType::Int8);
native_type!(i16, DataType::Int16);
native_type!(i32, DataType::Int32);
native_type!(i64, DataType::Int64);
native_type!(u8, DataType::UInt8);
native_type!(u16, DataType::UInt16);
native_type!(u32, DataType::UInt32);
native_type!(u64, DataType::UInt64);
native_type!(f32, DataType::Float32);
native_type!(f64, DataType::Float64);

pub struct PrimitiveArray<T: NativeType> {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: NativeType> PrimitiveArray<T> {
    /// Builds from a plain range of values, with no nulls (per `# 9`'s open
    /// question, the "from a range of plain values" constructor is
    /// first-class here).
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<T> = values.into_iter().collect();
        Self::build(values.len(), None, &values)
    }

    /// Builds from a range of [`Nullable<T>`] (the other first-class
    /// constructor named by `# 9`'s open question).
    #[must_use]
    pub fn from_nullables(items: impl IntoIterator<Item = Nullable<T>>) -> Self {
        let items: Vec<Nullable<T>> = items.into_iter().collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        let values: Vec<T> = items
            .iter()
            .map(|n| n.as_option().copied().unwrap_or_default())
            .collect();
        Self::build(values.len(), Some(validity), &values)
    }

    fn build(len: usize, validity: Option<Vec<bool>>, values: &[T]) -> Self {
        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let data_buf: AlignedBuffer<u8> = AlignedBuffer::from_slice(bytemuck::cast_slice(values));
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: T::data_type().format_string(),
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
            _marker: std::marker::PhantomData,
        }
    }

    /// Adopts an already-built proxy, validating its format string matches
    /// `T`.
    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let dt = proxy.data_type()?;
        if dt != T::data_type() {
            return Err(crate::error::Error::format_mismatch(format!(
                "expected {:?}, found {dt:?}",
                T::data_type()
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

    #[must_use]
    pub fn values(&self) -> &[T] {
        let ptr = self.proxy.buffer_ptr(1) as *const T;
        if ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ptr, self.len()) }
        }
    }

    #[must_use]
    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    pub fn at(&self, index: usize) -> Result<Nullable<T>> {
        check_index(index, self.len())?;
        let value = self.values()[index];
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Ok(Nullable::from_parts(value, present))
    }

    pub fn iter(&self) -> impl Iterator<Item = Nullable<T>> + '_ {
        (0..self.len()).map(move |i| self.at(i).unwrap())
    }

    /// # Safety
    /// `index` must be `< len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<T> {
        let value = *self.values().get_unchecked(index);
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Nullable::from_parts(value, present)
    }

    fn sync_bitmap_buffer(&mut self) {
        if let Some(bm) = &self.bitmap {
            let bitmap_buf = self.proxy.buffer_mut(0);
            bitmap_buf.clear();
            bitmap_buf.extend_from_slice(bm.as_bytes());
        }
    }

    /// Refreshes the proxy's length, null count and cached buffer pointers
    /// after a mutation changed the element count.
    fn finish_resize(&mut self, new_len: usize) {
        self.sync_bitmap_buffer();
        let null_count = self.bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        self.proxy.set_length(new_len, null_count);
        self.proxy.update_buffers();
    }

    /// Appends a (possibly null) value, growing the underlying buffers in
    /// place and refreshing the proxy's cached buffer pointers.
    pub fn push(&mut self, value: Nullable<T>) {
        let present = value.has_value();
        let raw = value.value_or(T::default());
        self.proxy
            .buffer_mut(1)
            .extend_from_slice(bytemuck::bytes_of(&raw));
        let new_len = self.len() + 1;
        match &mut self.bitmap {
            Some(bm) => bm.resize(new_len, present),
            None if !present => {
                let mut bm = Bitmap::new(new_len, true);
                bm.set(new_len - 1, false);
                self.bitmap = Some(bm);
            }
            None => {}
        }
        self.finish_resize(new_len);
    }

    /// Removes and returns the last element, or `None` if the array is
    /// empty.
    pub fn pop(&mut self) -> Option<Nullable<T>> {
        if self.is_empty() {
            return None;
        }
        let last = self.len() - 1;
        let removed = self.at(last).unwrap();
        let elem_size = std::mem::size_of::<T>();
        self.proxy
            .buffer_mut(1)
            .erase_range(last * elem_size, last * elem_size + elem_size);
        if let Some(bm) = &mut self.bitmap {
            bm.erase(last);
        }
        self.finish_resize(last);
        Some(removed)
    }

    /// Inserts `value` at `index`, shifting everything after it right by
    /// one.
    ///
    /// # Panics
    /// Panics if `index > len()`.
    pub fn insert(&mut self, index: usize, value: Nullable<T>) {
        let len = self.len();
        assert!(index <= len, "insert index {index} out of range for length {len}");
        let present = value.has_value();
        let raw = value.value_or(T::default());
        let elem_size = std::mem::size_of::<T>();
        {
            let data_buf = self.proxy.buffer_mut(1);
            let byte_index = index * elem_size;
            for (offset, &b) in bytemuck::bytes_of(&raw).iter().enumerate() {
                data_buf.insert(byte_index + offset, b);
            }
        }
        let new_len = len + 1;
        match &mut self.bitmap {
            Some(bm) => bm.insert(index, present),
            None if !present => {
                let mut bm = Bitmap::new(new_len, true);
                bm.set(index, false);
                self.bitmap = Some(bm);
            }
            None => {}
        }
        self.finish_resize(new_len);
    }

    /// Removes and returns the element at `index`, shifting everything
    /// after it left by one.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn erase(&mut self, index: usize) -> Nullable<T> {
        let len = self.len();
        assert!(index < len, "erase index {index} out of range for length {len}");
        let removed = self.at(index).unwrap();
        let elem_size = std::mem::size_of::<T>();
        self.proxy
            .buffer_mut(1)
            .erase_range(index * elem_size, (index + 1) * elem_size);
        if let Some(bm) = &mut self.bitmap {
            bm.erase(index);
        }
        self.finish_resize(len - 1);
        removed
    }

    /// Replaces the half-open range `[start, end)` with `values`, which may
    /// be a different length than the range it replaces.
    ///
    /// # Panics
    /// Panics if `start > end` or `end > len()`.
    pub fn assign_range(&mut self, start: usize, end: usize, values: impl IntoIterator<Item = Nullable<T>>) {
        assert!(start <= end && end <= self.len());
        for _ in start..end {
            self.erase(start);
        }
        for (offset, value) in values.into_iter().enumerate() {
            self.insert(start + offset, value);
        }
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl<T: NativeType> Array for PrimitiveArray<T> {
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

/// Bit-packed boolean layout: `bool` cannot implement [`NativeType`] (not
/// every byte pattern is a valid `bool`, so it cannot be [`bytemuck::Pod`]),
/// so booleans get their own façade with the data buffer packed the same
/// way the validity bitmap is.
pub struct BooleanArray {
    proxy: ArrowProxy,
    bitmap: Option<Bitmap>,
    values: Bitmap,
}

impl BooleanArray {
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = bool>) -> Self {
        let values: Vec<bool> = values.into_iter().collect();
        Self::build(values.len(), None, &values)
    }

    #[must_use]
    pub fn from_nullables(items: impl IntoIterator<Item = Nullable<bool>>) -> Self {
        let items: Vec<Nullable<bool>> = items.into_iter().collect();
        let validity: Vec<bool> = items.iter().map(Nullable::has_value).collect();
        let values: Vec<bool> = items
            .iter()
            .map(|n| n.as_option().copied().unwrap_or_default())
            .collect();
        Self::build(values.len(), Some(validity), &values)
    }

    fn build(len: usize, validity: Option<Vec<bool>>, values: &[bool]) -> Self {
        let bitmap = validity.map(Bitmap::from_iter);
        let null_count = bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        let bitmap_buf = match &bitmap {
            Some(bm) => AlignedBuffer::from_slice(bm.as_bytes()),
            None => AlignedBuffer::new(),
        };
        let values_bitmap = Bitmap::from_iter(values.iter().copied());
        let values_buf = AlignedBuffer::from_slice(values_bitmap.as_bytes());
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::Boolean.format_string(),
            name: None,
            metadata: None,
            flags: 2,
            length: len,
            null_count,
            offset: 0,
            buffers: vec![bitmap_buf, values_buf],
            children: vec![],
            dictionary: None,
        });
        Self {
            proxy,
            bitmap,
            values: values_bitmap,
        }
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let dt = proxy.data_type()?;
        if dt != DataType::Boolean {
            return Err(crate::error::Error::format_mismatch(format!(
                "expected Boolean, found {dt:?}"
            )));
        }
        check_validity_buffer_presence(&proxy, &dt)?;
        let len = proxy.len();
        let bitmap = read_validity_bitmap(&proxy, len);
        let ptr = proxy.buffer_ptr(1);
        let byte_len = (len + 7) / 8;
        let values = if ptr.is_null() {
            Bitmap::new(len, false)
        } else {
            let bytes = unsafe { std::slice::from_raw_parts(ptr, byte_len) };
            Bitmap::from_bytes(AlignedBuffer::from_slice(bytes), len)
        };
        Ok(Self { proxy, bitmap, values })
    }

    pub fn at(&self, index: usize) -> Result<Nullable<bool>> {
        check_index(index, self.len())?;
        let value = self.values.get(index);
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Ok(Nullable::from_parts(value, present))
    }

    /// # Safety
    /// `index` must be `< len()`.
    #[must_use]
    pub unsafe fn get_unchecked(&self, index: usize) -> Nullable<bool> {
        let value = self.values.get(index);
        let present = self.bitmap.as_ref().map_or(true, |bm| bm.get(index));
        Nullable::from_parts(value, present)
    }

    pub fn iter(&self) -> impl Iterator<Item = Nullable<bool>> + '_ {
        (0..self.len()).map(move |i| self.at(i).unwrap())
    }

    fn sync_buffers(&mut self) {
        if let Some(bm) = &self.bitmap {
            let bitmap_buf = self.proxy.buffer_mut(0);
            bitmap_buf.clear();
            bitmap_buf.extend_from_slice(bm.as_bytes());
        }
        let values_buf = self.proxy.buffer_mut(1);
        values_buf.clear();
        values_buf.extend_from_slice(self.values.as_bytes());
    }

    fn finish_resize(&mut self, new_len: usize) {
        self.sync_buffers();
        let null_count = self.bitmap.as_ref().map_or(0, Bitmap::count_unset) as i64;
        self.proxy.set_length(new_len, null_count);
        self.proxy.update_buffers();
    }

    pub fn push(&mut self, value: Nullable<bool>) {
        let present = value.has_value();
        let raw = value.value_or(false);
        let new_len = self.len() + 1;
        self.values.resize(new_len, false);
        self.values.set(new_len - 1, raw);
        match &mut self.bitmap {
            Some(bm) => bm.resize(new_len, present),
            None if !present => {
                let mut bm = Bitmap::new(new_len, true);
                bm.set(new_len - 1, false);
                self.bitmap = Some(bm);
            }
            None => {}
        }
        self.finish_resize(new_len);
    }

    pub fn pop(&mut self) -> Option<Nullable<bool>> {
        if self.is_empty() {
            return None;
        }
        let last = self.len() - 1;
        let removed = self.at(last).unwrap();
        self.values.resize(last, false);
        if let Some(bm) = &mut self.bitmap {
            bm.erase(last);
        }
        self.finish_resize(last);
        Some(removed)
    }

    /// # Panics
    /// Panics if `index > len()`.
    pub fn insert(&mut self, index: usize, value: Nullable<bool>) {
        let len = self.len();
        assert!(index <= len, "insert index {index} out of range for length {len}");
        let present = value.has_value();
        let raw = value.value_or(false);
        self.values.insert(index, raw);
        let new_len = len + 1;
        match &mut self.bitmap {
            Some(bm) => bm.insert(index, present),
            None if !present => {
                let mut bm = Bitmap::new(new_len, true);
                bm.set(index, false);
                self.bitmap = Some(bm);
            }
            None => {}
        }
        self.finish_resize(new_len);
    }

    /// # Panics
    /// Panics if `index >= len()`.
    pub fn erase(&mut self, index: usize) -> Nullable<bool> {
        let len = self.len();
        assert!(index < len, "erase index {index} out of range for length {len}");
        let removed = self.at(index).unwrap();
        self.values.erase(index);
        if let Some(bm) = &mut self.bitmap {
            bm.erase(index);
        }
        self.finish_resize(len - 1);
        removed
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for BooleanArray {
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
    fn round_trip_with_one_null() {
        let arr = PrimitiveArray::<i32>::from_nullables([
            Nullable::some(1),
            Nullable::some(2),
            Nullable::none(),
            Nullable::some(4),
            Nullable::some(5),
        ]);
        assert_eq!(arr.len(), 5);
        assert_eq!(arr.null_count(), 1);
        let expected = [
            Nullable::some(1),
            Nullable::some(2),
            Nullable::none(),
            Nullable::some(4),
            Nullable::some(5),
        ];
        for (got, want) in arr.iter().zip(expected) {
            assert_eq!(got, want);
        }
    }

    #[test]
    fn from_values_has_no_nulls() {
        let arr = PrimitiveArray::<f64>::from_values([1.0, 2.0, 3.0]);
        assert_eq!(arr.null_count(), 0);
        assert_eq!(arr.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn push_grows_buffers_and_updates_proxy() {
        let mut arr = PrimitiveArray::<i32>::from_values([1, 2]);
        arr.push(Nullable::none());
        arr.push(Nullable::some(9));
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.null_count(), 1);
        assert_eq!(arr.at(2).unwrap(), Nullable::none());
        assert_eq!(arr.at(3).unwrap(), Nullable::some(9));
    }

    #[test]
    fn pop_shrinks_and_returns_the_last_element() {
        let mut arr = PrimitiveArray::<i32>::from_values([1, 2, 3]);
        assert_eq!(arr.pop(), Some(Nullable::some(3)));
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.values(), &[1, 2]);
        let mut empty = PrimitiveArray::<i32>::from_values([]);
        assert_eq!(empty.pop(), None);
    }

    #[test]
    fn insert_shifts_subsequent_elements_right() {
        let mut arr = PrimitiveArray::<i32>::from_values([1, 2, 4]);
        arr.insert(2, Nullable::some(3));
        assert_eq!(arr.values(), &[1, 2, 3, 4]);
        assert_eq!(arr.len(), 4);
    }

    #[test]
    fn insert_null_establishes_a_bitmap_on_a_previously_bitmap_free_array() {
        let mut arr = PrimitiveArray::<i32>::from_values([1, 2]);
        arr.insert(1, Nullable::none());
        assert_eq!(arr.null_count(), 1);
        assert_eq!(arr.at(1).unwrap(), Nullable::none());
        assert_eq!(arr.at(2).unwrap(), Nullable::some(2));
    }

    #[test]
    fn erase_shifts_subsequent_elements_left() {
        let mut arr = PrimitiveArray::<i32>::from_values([1, 2, 3]);
        let removed = arr.erase(1);
        assert_eq!(removed, Nullable::some(2));
        assert_eq!(arr.values(), &[1, 3]);
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn assign_range_replaces_with_a_different_length() {
        let mut arr = PrimitiveArray::<i32>::from_values([1, 2, 3, 4, 5]);
        arr.assign_range(1, 4, [Nullable::some(20), Nullable::some(30)]);
        assert_eq!(arr.values(), &[1, 20, 30, 5]);
    }

    #[test]
    fn get_unchecked_matches_checked_access() {
        let arr = PrimitiveArray::<i32>::from_nullables([Nullable::some(1), Nullable::none()]);
        unsafe {
            assert_eq!(arr.get_unchecked(0), arr.at(0).unwrap());
            assert_eq!(arr.get_unchecked(1), arr.at(1).unwrap());
        }
    }

    #[test]
    fn proxy_round_trip_preserves_format() {
        let arr = PrimitiveArray::<u16>::from_values([10u16, 20, 30]);
        let proxy = arr.into_proxy();
        assert_eq!(proxy.data_type().unwrap(), DataType::UInt16);
        let reconstructed = PrimitiveArray::<u16>::from_proxy(proxy).unwrap();
        assert_eq!(reconstructed.values(), &[10, 20, 30]);
    }

    #[test]
    fn boolean_round_trips_with_a_null() {
        let arr = BooleanArray::from_nullables([Nullable::some(true), Nullable::none(), Nullable::some(false)]);
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.null_count(), 1);
        assert_eq!(arr.at(0).unwrap(), Nullable::some(true));
        assert_eq!(arr.at(1).unwrap(), Nullable::none());
        assert_eq!(arr.at(2).unwrap(), Nullable::some(false));
    }

    #[test]
    fn boolean_push_pop_insert_erase() {
        let mut arr = BooleanArray::from_values([true, false]);
        arr.push(Nullable::some(true));
        assert_eq!(arr.len(), 3);
        arr.insert(1, Nullable::none());
        assert_eq!(arr.at(1).unwrap(), Nullable::none());
        assert_eq!(arr.at(2).unwrap(), Nullable::some(false));
        let removed = arr.erase(1);
        assert_eq!(removed, Nullable::none());
        assert_eq!(arr.pop(), Some(Nullable::some(true)));
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn boolean_proxy_round_trip_preserves_format() {
        let arr = BooleanArray::from_values([true, false, true]);
        let proxy = arr.into_proxy();
        assert_eq!(proxy.data_type().unwrap(), DataType::Boolean);
        let reconstructed = BooleanArray::from_proxy(proxy).unwrap();
        assert_eq!(reconstructed.iter().collect::<Vec<_>>(), vec![
            Nullable::some(true),
            Nullable::some(false),
            Nullable::some(true)
        ]);
    }
}
