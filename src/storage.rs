//! Storage adapter abstraction.
//!
//! The planner only needs two things from a store: the shard prefixes its
//! row keys start with, and how a [`ScanRange`] maps onto the store's own
//! key bounds. [`MemoryStore`] is an ordered in-memory implementation.

mod memory;

pub use memory::MemoryStore;

use bytes::Bytes;
use spatio_keyspace_types::ScanRange;
use spatio_keyspace_types::key::following_prefix;
use std::ops::Bound;

/// Capabilities the planner needs from an ordered key-value store.
pub trait StorageAdapter: Send + Sync {
    /// Shard prefixes every row key starts with. Empty means unsharded.
    fn shard_prefixes(&self) -> Vec<Bytes>;

    /// Store key bounds for a scan range.
    ///
    /// The default treats an inclusive upper key as a prefix and scans up to
    /// the first key past it.
    fn row_key_bounds(&self, range: &ScanRange) -> (Bound<Bytes>, Bound<Bytes>) {
        match range {
            ScanRange::Unbounded => (Bound::Unbounded, Bound::Unbounded),
            ScanRange::Bounded {
                lower,
                upper,
                upper_inclusive: false,
            } => (Bound::Included(lower.clone()), Bound::Excluded(upper.clone())),
            ScanRange::Bounded {
                lower,
                upper,
                upper_inclusive: true,
            } => (
                Bound::Included(lower.clone()),
                following_prefix(upper).map_or(Bound::Unbounded, Bound::Excluded),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unsharded;

    impl StorageAdapter for Unsharded {
        fn shard_prefixes(&self) -> Vec<Bytes> {
            Vec::new()
        }
    }

    #[test]
    fn test_default_row_key_bounds() {
        let adapter = Unsharded;
        assert_eq!(
            adapter.row_key_bounds(&ScanRange::Unbounded),
            (Bound::Unbounded, Bound::Unbounded)
        );

        let half_open = ScanRange::half_open(Bytes::from_static(b"a"), Bytes::from_static(b"c"));
        assert_eq!(
            adapter.row_key_bounds(&half_open),
            (
                Bound::Included(Bytes::from_static(b"a")),
                Bound::Excluded(Bytes::from_static(b"c"))
            )
        );

        let prefix = ScanRange::through_prefix(Bytes::from_static(b"a"), Bytes::from_static(b"c"));
        assert_eq!(
            adapter.row_key_bounds(&prefix).1,
            Bound::Excluded(Bytes::from_static(b"d"))
        );

        let top = ScanRange::through_prefix(Bytes::from_static(b"a"), Bytes::from_static(&[0xff]));
        assert_eq!(adapter.row_key_bounds(&top).1, Bound::Unbounded);
    }
}
