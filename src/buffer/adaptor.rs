//! Zero-copy reinterpretation of a buffer of `T` as a buffer of `U` where
//! `size_of::<U>() >= size_of::<T>()`.
//!
//! Rust's borrow checker gives us the "const propagation" the original
//! template gets from `const`-overloading for free: an adaptor only exists
//! while it holds `&mut AlignedBuffer<T>`, so there is no way to construct
//! one over an immutably-borrowed buffer and then mutate through it. Reading
//! a reinterpreted view of an immutable buffer is `BufferView::cast`
//! instead, which simply has no mutating methods.

use std::marker::PhantomData;

use bytemuck::Pod;

use super::{view::BufferView, AlignedBuffer};

impl<'a, T: Pod> BufferView<'a, T> {
    /// Reinterprets this view's bytes as a sequence of `U`.
    ///
    /// # Panics
    /// Panics if the byte length is not a multiple of `size_of::<U>()`.
    #[must_use]
    pub fn cast<U: Pod>(&self) -> BufferView<'a, U> {
        let casted: &'a [U] = bytemuck::cast_slice(self.as_slice());
        BufferView::from_slice(casted)
    }
}

/// A mutable, typed window of `U` over an underlying `AlignedBuffer<T>` of a
/// narrower (or equal) byte-like element, e.g. a buffer of `u8` reinterpreted
/// as `i32`. All element operations are expressed in units of `U`; the ratio
/// `size_of::<U>() / size_of::<T>()` must evenly divide the underlying
/// buffer's length, which is asserted on construction and after every
/// mutation.
pub struct BufferAdaptor<'a, T: Pod, U: Pod> {
    underlying: &'a mut AlignedBuffer<T>,
    _marker: PhantomData<U>,
}

impl<'a, T: Pod, U: Pod> BufferAdaptor<'a, T, U> {
    /// # Panics
    /// Panics if `size_of::<U>() < size_of::<T>()`, if the ratio is not a
    /// whole number, or if the underlying buffer's length is not a multiple
    /// of the ratio.
    #[must_use]
    pub fn new(underlying: &'a mut AlignedBuffer<T>) -> Self {
        let adaptor = Self {
            underlying,
            _marker: PhantomData,
        };
        adaptor.assert_aligned();
        adaptor
    }

    fn ratio() -> usize {
        let t = std::mem::size_of::<T>().max(1);
        let u = std::mem::size_of::<U>();
        assert!(u >= t, "buffer adaptor requires size_of::<U>() >= size_of::<T>()");
        assert_eq!(u % t, 0, "size_of::<U>() must be a multiple of size_of::<T>()");
        u / t
    }

    fn assert_aligned(&self) {
        let ratio = Self::ratio();
        assert_eq!(
            self.underlying.len() % ratio,
            0,
            "underlying buffer length is not a multiple of the adaptor ratio"
        );
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.underlying.len() / Self::ratio()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[U] {
        bytemuck::cast_slice(self.underlying.as_slice())
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [U] {
        bytemuck::cast_slice_mut(self.underlying.as_mut_slice())
    }

    pub fn get(&self, index: usize) -> Option<&U> {
        self.as_slice().get(index)
    }

    pub fn set(&mut self, index: usize, value: U) {
        self.as_mut_slice()[index] = value;
    }

    pub fn push(&mut self, value: U) {
        let ratio = Self::ratio();
        let at = self.underlying.len();
        self.underlying.insert_n(at, ratio, T::zeroed());
        self.as_mut_slice()[self.size() - 1] = value;
    }

    /// # Panics
    /// Panics if `index > size()`.
    pub fn insert(&mut self, index: usize, value: U) {
        let ratio = Self::ratio();
        assert!(index <= self.size());
        self.underlying.insert_n(index * ratio, ratio, T::zeroed());
        self.as_mut_slice()[index] = value;
    }

    /// # Panics
    /// Panics if `index >= size()`.
    pub fn erase(&mut self, index: usize) {
        let ratio = Self::ratio();
        assert!(index < self.size());
        self.underlying.erase_range(index * ratio, (index + 1) * ratio);
    }

    pub fn resize(&mut self, new_len: usize, value: U) {
        let ratio = Self::ratio();
        let cur = self.size();
        if new_len > cur {
            for _ in cur..new_len {
                self.push(value);
            }
        } else {
            self.underlying.resize(new_len * ratio, T::zeroed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinterprets_bytes_as_wider_elements() {
        let mut bytes: AlignedBuffer<u8> = AlignedBuffer::zeroed(8);
        let mut adaptor: BufferAdaptor<u8, i32> = BufferAdaptor::new(&mut bytes);
        assert_eq!(adaptor.size(), 2);
        adaptor.set(0, -1);
        adaptor.set(1, 42);
        assert_eq!(adaptor.as_slice(), &[-1, 42]);
    }

    #[test]
    fn push_grows_underlying_by_ratio() {
        let mut bytes: AlignedBuffer<u8> = AlignedBuffer::new();
        let mut adaptor: BufferAdaptor<u8, i64> = BufferAdaptor::new(&mut bytes);
        adaptor.push(7);
        adaptor.push(-3);
        assert_eq!(adaptor.as_slice(), &[7, -3]);
        drop(adaptor);
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn erase_removes_one_wide_element() {
        let mut bytes: AlignedBuffer<u8> = AlignedBuffer::new();
        let mut adaptor: BufferAdaptor<u8, i32> = BufferAdaptor::new(&mut bytes);
        adaptor.push(1);
        adaptor.push(2);
        adaptor.push(3);
        adaptor.erase(1);
        assert_eq!(adaptor.as_slice(), &[1, 3]);
    }

    #[test]
    fn view_cast_reinterprets_read_only() {
        let bytes: AlignedBuffer<u8> = AlignedBuffer::from_slice(&[1, 0, 0, 0, 2, 0, 0, 0]);
        let view = BufferView::from_buffer(&bytes);
        let as_i32 = view.cast::<i32>();
        assert_eq!(as_i32.as_slice(), &[1, 2]);
    }
}
