//! Dense and sparse union layouts. Neither carries a validity bitmap —
//! nullability, if any, lives entirely inside the selected child — so
//! buffer 0 is always the `i8` type-id array. Dense unions add an `i32`
//! offsets buffer pointing into the selected child; sparse unions instead
//! require every child to share the union's own length, so element `i`
//! always lives at row `i` of whichever child its type id selects.

use std::collections::HashMap;

use crate::array::Array;
use crate::datatype::{union_child_index_map, DataType};
use crate::error::{Error, Result};
use crate::ffi::proxy::{ArrowProxyView, OwnedArraySpec};
use crate::ffi::ArrowProxy;

fn type_ids_buffer(ids: &[i8]) -> crate::buffer::AlignedBuffer<u8> {
    crate::buffer::AlignedBuffer::from_slice(bytemuck::cast_slice(ids))
}

pub struct DenseUnionArray {
    proxy: ArrowProxy,
    child_index: HashMap<i8, usize>,
}

impl DenseUnionArray {
    /// `declared_type_ids[k]` names the type id of `children[k]`; `type_ids`
    /// and `offsets` are per-element (same length as the union itself).
    pub fn new(
        declared_type_ids: Vec<i8>,
        type_ids: &[i8],
        offsets: &[i32],
        children: Vec<ArrowProxy>,
    ) -> Result<Self> {
        if type_ids.len() != offsets.len() {
            return Err(Error::invariant("type_ids and offsets must have equal length"));
        }
        if declared_type_ids.len() != children.len() {
            return Err(Error::invariant("declared_type_ids must match children count"));
        }
        let child_index = union_child_index_map(&declared_type_ids);
        for (i, &id) in type_ids.iter().enumerate() {
            let child = *child_index
                .get(&id)
                .ok_or_else(|| Error::invariant(format!("element {i} has undeclared type id {id}")))?;
            let off = offsets[i] as usize;
            if off >= children[child].len() {
                return Err(Error::invariant(format!(
                    "element {i} offset {off} exceeds child {child} length {}",
                    children[child].len()
                )));
            }
        }

        let type_ids_buf = type_ids_buffer(type_ids);
        let offsets_buf = crate::buffer::AlignedBuffer::from_slice(bytemuck::cast_slice(offsets));
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::DenseUnion(declared_type_ids).format_string(),
            name: None,
            metadata: None,
            flags: 0,
            length: type_ids.len(),
            null_count: 0,
            offset: 0,
            buffers: vec![type_ids_buf, offsets_buf],
            children,
            dictionary: None,
        });
        Ok(Self { proxy, child_index })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let child_index = match proxy.data_type()? {
            DataType::DenseUnion(ids) => union_child_index_map(&ids),
            other => return Err(Error::format_mismatch(format!("expected dense union, found {other:?}"))),
        };
        Ok(Self { proxy, child_index })
    }

    fn type_ids(&self) -> &[i8] {
        let ptr = self.proxy.buffer_ptr(0) as *const i8;
        unsafe { std::slice::from_raw_parts(ptr, self.len()) }
    }

    fn offsets(&self) -> &[i32] {
        let ptr = self.proxy.buffer_ptr(1) as *const i32;
        unsafe { std::slice::from_raw_parts(ptr, self.len()) }
    }

    pub fn value_type(&self, index: usize) -> i8 {
        self.type_ids()[index]
    }

    /// The `(child_index, row_in_child)` pair backing element `index`.
    pub fn value_location(&self, index: usize) -> (usize, usize) {
        let id = self.type_ids()[index];
        let child = self.child_index[&id];
        (child, self.offsets()[index] as usize)
    }

    #[must_use]
    pub fn child(&self, index: usize) -> ArrowProxyView<'_> {
        self.proxy.child_view(index)
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for DenseUnionArray {
    fn len(&self) -> usize {
        self.proxy.len()
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

pub struct SparseUnionArray {
    proxy: ArrowProxy,
    child_index: HashMap<i8, usize>,
}

impl SparseUnionArray {
    pub fn new(declared_type_ids: Vec<i8>, type_ids: &[i8], children: Vec<ArrowProxy>) -> Result<Self> {
        if declared_type_ids.len() != children.len() {
            return Err(Error::invariant("declared_type_ids must match children count"));
        }
        for child in &children {
            if child.len() != type_ids.len() {
                return Err(Error::invariant(format!(
                    "sparse union child has {} rows, expected {}",
                    child.len(),
                    type_ids.len()
                )));
            }
        }
        let child_index = union_child_index_map(&declared_type_ids);
        for (i, id) in type_ids.iter().enumerate() {
            if !child_index.contains_key(id) {
                return Err(Error::invariant(format!("element {i} has undeclared type id {id}")));
            }
        }

        let type_ids_buf = type_ids_buffer(type_ids);
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::SparseUnion(declared_type_ids).format_string(),
            name: None,
            metadata: None,
            flags: 0,
            length: type_ids.len(),
            null_count: 0,
            offset: 0,
            buffers: vec![type_ids_buf],
            children,
            dictionary: None,
        });
        Ok(Self { proxy, child_index })
    }

    pub fn from_proxy(proxy: ArrowProxy) -> Result<Self> {
        let child_index = match proxy.data_type()? {
            DataType::SparseUnion(ids) => union_child_index_map(&ids),
            other => return Err(Error::format_mismatch(format!("expected sparse union, found {other:?}"))),
        };
        Ok(Self { proxy, child_index })
    }

    fn type_ids(&self) -> &[i8] {
        let ptr = self.proxy.buffer_ptr(0) as *const i8;
        unsafe { std::slice::from_raw_parts(ptr, self.len()) }
    }

    pub fn value_type(&self, index: usize) -> i8 {
        self.type_ids()[index]
    }

    /// `(child_index, row_in_child)`; the row is always `index` itself for
    /// the sparse layout.
    pub fn value_location(&self, index: usize) -> (usize, usize) {
        let id = self.type_ids()[index];
        (self.child_index[&id], index)
    }

    #[must_use]
    pub fn child(&self, index: usize) -> ArrowProxyView<'_> {
        self.proxy.child_view(index)
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for SparseUnionArray {
    fn len(&self) -> usize {
        self.proxy.len()
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
    fn dense_union_resolves_type_and_location() {
        let ints = PrimitiveArray::<i32>::from_values([10, 11]).into_proxy();
        let floats = PrimitiveArray::<f64>::from_values([1.5]).into_proxy();
        let u = DenseUnionArray::new(vec![0, 1], &[0, 1, 0], &[0, 0, 1], vec![ints, floats]).unwrap();
        assert_eq!(u.value_type(0), 0);
        assert_eq!(u.value_location(0), (0, 0));
        assert_eq!(u.value_type(1), 1);
        assert_eq!(u.value_location(1), (1, 0));
        assert_eq!(u.value_location(2), (0, 1));
    }

    #[test]
    fn sparse_union_requires_matching_child_lengths() {
        let a = PrimitiveArray::<i32>::from_values([1, 2]).into_proxy();
        let b = PrimitiveArray::<f64>::from_values([1.0]).into_proxy();
        assert!(SparseUnionArray::new(vec![0, 1], &[0, 1], vec![a, b]).is_err());
    }

    #[test]
    fn sparse_union_resolves_by_row_index() {
        let a = PrimitiveArray::<i32>::from_values([1, 2, 3]).into_proxy();
        let b = PrimitiveArray::<f64>::from_values([9.0, 8.0, 7.0]).into_proxy();
        let u = SparseUnionArray::new(vec![0, 1], &[0, 1, 0], vec![a, b]).unwrap();
        assert_eq!(u.value_location(1), (1, 1));
    }
}
