//! The `ArrowSchema::metadata` wire format: a little-endian,
//! length-prefixed concatenation of key/value byte-string pairs, with no
//! NUL terminators anywhere.

use crate::error::{Error, Result};

/// Encodes key/value metadata pairs into the C Data Interface's binary
/// format: `int32 pair_count`, then per pair `int32 key_len, key bytes,
/// int32 value_len, value bytes`, all little-endian.
#[must_use]
pub fn encode_metadata(pairs: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(pairs.len() as i32).to_le_bytes());
    for (k, v) in pairs {
        out.extend_from_slice(&(k.len() as i32).to_le_bytes());
        out.extend_from_slice(k);
        out.extend_from_slice(&(v.len() as i32).to_le_bytes());
        out.extend_from_slice(v);
    }
    out
}

/// Decodes the binary metadata format back into key/value pairs.
///
/// # Errors
/// Returns [`Error::InvariantViolation`] if `bytes` is truncated relative
/// to the length prefixes it declares.
pub fn decode_metadata(bytes: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut cursor = 0usize;
    let count = read_i32(bytes, &mut cursor)? as usize;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key_len = read_i32(bytes, &mut cursor)? as usize;
        let key = read_bytes(bytes, &mut cursor, key_len)?;
        let val_len = read_i32(bytes, &mut cursor)? as usize;
        let val = read_bytes(bytes, &mut cursor, val_len)?;
        pairs.push((key, val));
    }
    Ok(pairs)
}

fn read_i32(bytes: &[u8], cursor: &mut usize) -> Result<i32> {
    let slice = read_bytes(bytes, cursor, 4)?;
    Ok(i32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_bytes(bytes: &[u8], cursor: &mut usize, len: usize) -> Result<Vec<u8>> {
    let end = cursor.checked_add(len).ok_or_else(|| {
        Error::invariant("metadata length prefix overflows buffer")
    })?;
    if end > bytes.len() {
        return Err(Error::invariant("metadata buffer truncated relative to its length prefixes"));
    }
    let out = bytes[*cursor..end].to_vec();
    *cursor = end;
    Ok(out)
}

/// Decodes metadata directly from a raw pointer to the start of the blob,
/// trusting the length prefixes the way [`std::ffi::CStr::from_ptr`] trusts
/// NUL termination: the caller guarantees `ptr` points at a validly encoded
/// blob with no prior bound on its total length.
///
/// # Safety
/// `ptr` must point at the start of a metadata blob produced by
/// [`encode_metadata`] (or an equivalent encoder), valid for reads of
/// however many bytes its own length prefixes declare.
pub unsafe fn decode_metadata_from_ptr(ptr: *const u8) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut cursor = ptr;
    let count = read_i32_at(&mut cursor);
    let mut pairs = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let key_len = read_i32_at(&mut cursor) as usize;
        let key = read_bytes_at(&mut cursor, key_len);
        let val_len = read_i32_at(&mut cursor) as usize;
        let val = read_bytes_at(&mut cursor, val_len);
        pairs.push((key, val));
    }
    pairs
}

unsafe fn read_i32_at(cursor: &mut *const u8) -> i32 {
    let mut buf = [0u8; 4];
    std::ptr::copy_nonoverlapping(*cursor, buf.as_mut_ptr(), 4);
    *cursor = cursor.add(4);
    i32::from_le_bytes(buf)
}

unsafe fn read_bytes_at(cursor: &mut *const u8, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    std::ptr::copy_nonoverlapping(*cursor, out.as_mut_ptr(), len);
    *cursor = cursor.add(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_pairs() {
        let pairs = vec![
            (b"key1".to_vec(), b"value one".to_vec()),
            (b"k2".to_vec(), vec![]),
        ];
        let encoded = encode_metadata(&pairs);
        let decoded = decode_metadata(&encoded).unwrap();
        assert_eq!(decoded, pairs);
    }

    #[test]
    fn empty_metadata_round_trips() {
        let encoded = encode_metadata(&[]);
        assert_eq!(decode_metadata(&encoded).unwrap(), vec![]);
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        let mut encoded = encode_metadata(&[(b"k".to_vec(), b"v".to_vec())]);
        encoded.truncate(encoded.len() - 1);
        assert!(decode_metadata(&encoded).is_err());
    }
}
