//! Run-end encoded layout: two children, `run_ends` (a non-nullable integer
//! array of `Int16`/`Int32`/`Int64`) and `values`, with no buffers of its
//! own. Logical element `i` maps to physical index `j`, the smallest index
//! with `run_ends[j] > i`; `values[j]` is the element. No validity bitmap —
//! nullability lives in `values`.

use crate::array::Array;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;

pub struct RunEndEncodedArray {
    proxy: ArrowProxy,
    logical_len: usize,
}

impl RunEndEncodedArray {
    pub fn new(logical_len: usize, run_ends: ArrowProxy, values: ArrowProxy) -> Result<Self> {
        match run_ends.data_type()? {
            DataType::Int16 | DataType::Int32 | DataType::Int64 => {}
            other => {
                return Err(Error::invariant(format!(
                    "run_ends must be an integer array, found {other:?}"
                )))
            }
        }
        if run_ends.len() != values.len() {
            return Err(Error::invariant(format!(
                "run_ends has {} entries, values has {}",
                run_ends.len(),
                values.len()
            )));
        }
        if !run_ends.is_empty() {
            let view = run_ends.view();
            for i in 1..run_ends.len() {
                let prev = read_run_end(&view, i - 1);
                let curr = read_run_end(&view, i);
                if curr <= prev {
                    return Err(Error::invariant(format!(
                        "run_ends must be strictly increasing: index {i} has {curr}, previous was {prev}"
                    )));
                }
            }
            let last_end = read_run_end(&view, run_ends.len() - 1);
            if last_end != logical_len as i64 {
                return Err(Error::invariant(format!(
                    "final run end {last_end} does not cover the declared logical length {logical_len}"
                )));
            }
        } else if logical_len != 0 {
            return Err(Error::invariant("empty run_ends cannot cover a non-zero logical length"));
        }

        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::RunEndEncoded.format_string(),
            name: None,
            metadata: None,
            flags: 0,
            length: logical_len,
            null_count: 0,
            offset: 0,
            buffers: vec![],
            children: vec![run_ends, values],
            dictionary: None,
        });
        Ok(Self { proxy, logical_len })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let dt = proxy.data_type()?;
        if dt != DataType::RunEndEncoded {
            return Err(Error::format_mismatch(format!("expected run-end encoded, found {dt:?}")));
        }
        let logical_len = proxy.len();
        Ok(Self { proxy, logical_len })
    }

    #[must_use]
    pub fn run_ends(&self) -> ArrowProxyView<'_> {
        self.proxy.child_view(0)
    }

    #[must_use]
    pub fn values(&self) -> ArrowProxyView<'_> {
        self.proxy.child_view(1)
    }

    /// Binary search for the physical index whose run covers `logical_index`.
    pub fn physical_index(&self, logical_index: usize) -> Result<usize> {
        if logical_index >= self.logical_len {
            return Err(Error::OutOfRange {
                index: logical_index,
                len: self.logical_len,
            });
        }
        let run_ends = self.run_ends();
        let n = run_ends.len();
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if read_run_end(&run_ends, mid) > logical_index as i64 {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    /// # Safety
    /// `logical_index` must be `< len()`.
    #[must_use]
    pub unsafe fn physical_index_unchecked(&self, logical_index: usize) -> usize {
        let run_ends = self.run_ends();
        let n = run_ends.len();
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if read_run_end(&run_ends, mid) > logical_index as i64 {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

fn read_run_end(view: &ArrowProxyView<'_>, index: usize) -> i64 {
    let dt = view.data_type().expect("run_ends format was validated at construction");
    let ptr = view.buffer_ptr(1);
    match dt {
        DataType::Int16 => unsafe { *(ptr as *const i16).add(index) as i64 },
        DataType::Int32 => unsafe { *(ptr as *const i32).add(index) as i64 },
        DataType::Int64 => unsafe { *(ptr as *const i64).add(index) },
        other => unreachable!("run_ends format was validated as integer, found {other:?}"),
    }
}

impl Array for RunEndEncodedArray {
    fn len(&self) -> usize {
        self.logical_len
    }

    fn null_count(&self) -> i64 {
        0
    }

    fn is_valid(&self, _index: usize) -> bool {
        true
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
    fn binary_search_locates_correct_run() {
        let run_ends = PrimitiveArray::<i32>::from_values([3, 5, 8]).into_proxy();
        let values = PrimitiveArray::<i32>::from_values([100, 200, 300]).into_proxy();
        let ree = RunEndEncodedArray::new(8, run_ends, values).unwrap();
        assert_eq!(ree.len(), 8);
        assert_eq!(ree.physical_index(0).unwrap(), 0);
        assert_eq!(ree.physical_index(2).unwrap(), 0);
        assert_eq!(ree.physical_index(3).unwrap(), 1);
        assert_eq!(ree.physical_index(4).unwrap(), 1);
        assert_eq!(ree.physical_index(5).unwrap(), 2);
        assert_eq!(ree.physical_index(7).unwrap(), 2);
        assert!(ree.physical_index(8).is_err());
    }

    #[test]
    fn mismatched_final_run_end_is_rejected() {
        let run_ends = PrimitiveArray::<i32>::from_values([3, 5]).into_proxy();
        let values = PrimitiveArray::<i32>::from_values([1, 2]).into_proxy();
        assert!(RunEndEncodedArray::new(10, run_ends, values).is_err());
    }

    #[test]
    fn non_increasing_run_ends_are_rejected() {
        let run_ends = PrimitiveArray::<i32>::from_values([3, 3, 8]).into_proxy();
        let values = PrimitiveArray::<i32>::from_values([1, 2, 3]).into_proxy();
        assert!(RunEndEncodedArray::new(8, run_ends, values).is_err());

        let run_ends = PrimitiveArray::<i32>::from_values([5, 2, 8]).into_proxy();
        let values = PrimitiveArray::<i32>::from_values([1, 2, 3]).into_proxy();
        assert!(RunEndEncodedArray::new(8, run_ends, values).is_err());
    }

    #[test]
    fn physical_index_unchecked_matches_checked_lookup() {
        let run_ends = PrimitiveArray::<i32>::from_values([3, 5, 8]).into_proxy();
        let values = PrimitiveArray::<i32>::from_values([100, 200, 300]).into_proxy();
        let ree = RunEndEncodedArray::new(8, run_ends, values).unwrap();
        for i in 0..8 {
            unsafe {
                assert_eq!(ree.physical_index_unchecked(i), ree.physical_index(i).unwrap());
            }
        }
    }
}
