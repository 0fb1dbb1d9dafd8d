//! Key fingerprinting.
//!
//! The tree does not order by natural key values: every key is reduced to a
//! 32-bit FNV-1a hash of its raw little-endian bytes, and that fingerprint
//! is the ordering key. Range scans over fingerprints are meaningless; only
//! point lookups are. Two distinct values hashing alike compare equal to
//! the tree — callers that need certainty compare the stored value as well.

use types::Value;

pub const FNV_OFFSET_BASIS: u32 = 2166136261;
pub const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over a byte slice.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Fingerprint of a typed key value.
///
/// Integers and floats hash their four little-endian bytes; text hashes its
/// bytes up to (not including) the first NUL. Booleans are not indexable
/// and fingerprint to 0.
pub fn fingerprint(value: &Value) -> u32 {
    match value {
        Value::Int(i) => fnv1a(&i.to_le_bytes()),
        Value::Float(x) => fnv1a(&x.to_le_bytes()),
        Value::Text(s) => {
            let bytes = s.as_bytes();
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            fnv1a(&bytes[..end])
        }
        Value::Bool(_) => 0,
    }
}
