//! Index keys and scan ranges.
//!
//! Z3 row keys are laid out as:
//!
//! ```text
//! [shard prefix][bin: i16 BE][z: u64 BE][record id bytes]
//! ```
//!
//! Big-endian encoding keeps lexicographic byte order equal to numeric order
//! for the non-negative bins and z values the index produces.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// A timestamp split into a coarse time bin and an offset into that bin.
///
/// The unit of `offset` depends on the bin period (milliseconds for days,
/// seconds for weeks, minutes for months and years).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinnedTime {
    pub bin: i16,
    pub offset: i64,
}

impl BinnedTime {
    pub fn new(bin: i16, offset: i64) -> Self {
        Self { bin, offset }
    }
}

/// Position of a record in the Z3 key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Z3IndexKey {
    pub bin: i16,
    pub z: u64,
}

impl Z3IndexKey {
    /// Encoded length of a key without shard prefix or record id.
    pub const LENGTH: usize = 10;

    pub fn new(bin: i16, z: u64) -> Self {
        Self { bin, z }
    }

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut out = [0u8; Self::LENGTH];
        out[..2].copy_from_slice(&self.bin.to_be_bytes());
        out[2..].copy_from_slice(&self.z.to_be_bytes());
        out
    }

    /// Decode the first ten bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LENGTH {
            return None;
        }
        let bin = i16::from_be_bytes(bytes[..2].try_into().ok()?);
        let z = u64::from_be_bytes(bytes[2..Self::LENGTH].try_into().ok()?);
        Some(Self { bin, z })
    }

    /// Full row key: shard prefix, key, then the record id.
    pub fn row_key(&self, shard: &[u8], id: &str) -> Bytes {
        let mut key = BytesMut::with_capacity(shard.len() + Self::LENGTH + id.len());
        key.put_slice(shard);
        key.put_slice(&self.to_bytes());
        key.put_slice(id.as_bytes());
        key.freeze()
    }
}

/// A contiguous range of row keys to scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanRange {
    /// Keys from `lower` (inclusive) up to `upper`.
    ///
    /// With `upper_inclusive == false` the range is half-open. With
    /// `upper_inclusive == true` the upper key acts as a prefix: every key
    /// starting with it is in range.
    Bounded {
        lower: Bytes,
        upper: Bytes,
        upper_inclusive: bool,
    },
    /// The whole table.
    Unbounded,
}

impl ScanRange {
    /// Half-open range `[lower, upper)`.
    pub fn half_open(lower: impl Into<Bytes>, upper: impl Into<Bytes>) -> Self {
        Self::Bounded {
            lower: lower.into(),
            upper: upper.into(),
            upper_inclusive: false,
        }
    }

    /// Range from `lower` through every key prefixed by `upper`.
    pub fn through_prefix(lower: impl Into<Bytes>, upper: impl Into<Bytes>) -> Self {
        Self::Bounded {
            lower: lower.into(),
            upper: upper.into(),
            upper_inclusive: true,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Check whether a row key falls inside this range.
    pub fn contains(&self, key: &[u8]) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded {
                lower,
                upper,
                upper_inclusive,
            } => {
                if key < lower.as_ref() {
                    return false;
                }
                if *upper_inclusive {
                    key <= upper.as_ref() || key.starts_with(upper)
                } else {
                    key < upper.as_ref()
                }
            }
        }
    }
}

/// Smallest byte string greater than every string starting with `prefix`.
///
/// Returns `None` when no such string exists (the prefix is empty or all
/// `0xFF`).
pub fn following_prefix(prefix: &[u8]) -> Option<Bytes> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last < u8::MAX {
            out.push(last + 1);
            return Some(Bytes::from(out));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bytes_roundtrip_and_order() {
        let a = Z3IndexKey::new(2, 10);
        let b = Z3IndexKey::new(2, 11);
        let c = Z3IndexKey::new(3, 0);

        assert_eq!(Z3IndexKey::from_bytes(&a.to_bytes()), Some(a));
        assert!(a.to_bytes() < b.to_bytes());
        assert!(b.to_bytes() < c.to_bytes());
        assert_eq!(Z3IndexKey::from_bytes(&[0, 1]), None);
    }

    #[test]
    fn test_row_key_layout() {
        let key = Z3IndexKey::new(1, 2).row_key(&[7], "abc");
        assert_eq!(key.len(), 1 + Z3IndexKey::LENGTH + 3);
        assert_eq!(key[0], 7);
        assert_eq!(&key[key.len() - 3..], b"abc");
    }

    #[test]
    fn test_scan_range_contains() {
        let half_open = ScanRange::half_open(vec![1u8, 0], vec![1u8, 5]);
        assert!(half_open.contains(&[1, 0]));
        assert!(half_open.contains(&[1, 4, 9, 9]));
        assert!(!half_open.contains(&[1, 5]));

        let prefixed = ScanRange::through_prefix(vec![1u8, 0], vec![1u8, 5]);
        assert!(prefixed.contains(&[1, 5]));
        assert!(prefixed.contains(&[1, 5, 255, 3]));
        assert!(!prefixed.contains(&[1, 6]));

        assert!(ScanRange::Unbounded.contains(b"anything"));
    }

    #[test]
    fn test_following_prefix() {
        assert_eq!(following_prefix(&[1, 2]), Some(Bytes::from_static(&[1, 3])));
        assert_eq!(following_prefix(&[1, 255]), Some(Bytes::from_static(&[2])));
        assert_eq!(following_prefix(&[255, 255]), None);
        assert_eq!(following_prefix(&[]), None);
    }
}
