//! The null layout: no buffers, every access returns null. `size` is the
//! only state.

use crate::array::Array;
use crate::datatype::DataType;
use crate::error::Result;
use crate::ffi::proxy::OwnedArraySpec;
use crate::ffi::ArrowProxy;
use crate::nullable::Nullable;

pub struct NullArray {
    proxy: ArrowProxy,
}

impl NullArray {
    #[must_use]
    pub fn new(len: usize) -> Self {
        let proxy = ArrowProxy::create_owned(OwnedArraySpec {
            format: DataType::Null.format_string(),
            name: None,
            metadata: None,
            flags: 0,
            length: len,
            null_count: len as i64,
            offset: 0,
            buffers: vec![],
            children: vec![],
            dictionary: None,
        });
        Self { proxy }
    }

    #[must_use]
    pub fn at(&self, index: usize) -> Result<Nullable<()>> {
        crate::array::check_index(index, self.len())?;
        Ok(Nullable::none())
    }

    /// # Safety
    /// `index` must be `< len()`.
    #[must_use]
    pub unsafe fn get_unchecked(&self, _index: usize) -> Nullable<()> {
        Nullable::none()
    }

    pub fn into_proxy(self) -> ArrowProxy {
        self.proxy
    }
}

impl Array for NullArray {
    fn len(&self) -> usize {
        self.proxy.len()
    }

    fn null_count(&self) -> i64 {
        self.len() as i64
    }

    fn is_valid(&self, _index: usize) -> bool {
        false
    }

    fn name(&self) -> Option<&str> {
        self.proxy.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_access_is_null() {
        let arr = NullArray::new(4);
        for i in 0..4 {
            assert!(arr.at(i).unwrap().is_null());
        }
        assert!(arr.at(4).is_err());
    }

    #[test]
    fn empty_null_array_exports_cleanly() {
        let arr = NullArray::new(0);
        assert_eq!(arr.len(), 0);
        let proxy = arr.into_proxy();
        assert_eq!(proxy.data_type().unwrap(), DataType::Null);
    }
}
