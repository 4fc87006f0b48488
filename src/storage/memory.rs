use super::StorageAdapter;
use crate::error::Result;
use crate::index::{Z3KeySpace, shard_for};
use crate::planner::QueryPlan;
use crate::record::Record;
use bytes::Bytes;
use rustc_hash::FxHashSet;
use spatio_keyspace_types::ScanRange;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered in-memory store of Z3 row keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: BTreeMap<Bytes, Record>,
    shard_count: u8,
}

impl MemoryStore {
    /// Store spreading rows over `shard_count` one-byte shard prefixes.
    ///
    /// A count of 0 or 1 writes unprefixed keys.
    pub fn new(shard_count: u8) -> Self {
        Self {
            data: BTreeMap::new(),
            shard_count,
        }
    }

    fn shard_prefix(&self, id: &str) -> Bytes {
        if self.shard_count <= 1 {
            Bytes::new()
        } else {
            let shard = shard_for(id, self.shard_count as usize) as u8;
            Bytes::copy_from_slice(&[shard])
        }
    }

    /// Index a record and store it under its row key.
    ///
    /// # Errors
    ///
    /// Fails if the record has no indexable geometry or date.
    pub fn write(&mut self, keyspace: &Z3KeySpace, record: Record) -> Result<Bytes> {
        let shard = self.shard_prefix(&record.id);
        let key = keyspace.row_key(&record, &shard)?;
        self.data.insert(key.clone(), record);
        Ok(key)
    }

    /// Rows inside one scan range, in key order.
    pub fn scan(&self, range: &ScanRange) -> Vec<(&Bytes, &Record)> {
        let (lower, upper) = self.row_key_bounds(range);
        if is_empty_range(&lower, &upper) {
            return Vec::new();
        }
        self.data.range((lower, upper)).collect()
    }

    /// Execute a plan: scan every range, apply the residual filter and drop
    /// duplicate record ids.
    pub fn query(&self, plan: &QueryPlan) -> Vec<&Record> {
        let mut seen = FxHashSet::default();
        let mut results = Vec::new();
        let mut scanned = 0usize;

        for range in &plan.ranges {
            for (_, record) in self.scan(range) {
                scanned += 1;
                let matches = plan
                    .residual_filter
                    .as_ref()
                    .is_none_or(|filter| filter.evaluate(record));
                if matches && seen.insert(record.id.as_str()) {
                    results.push(record);
                }
            }
        }

        log::debug!(
            "Scanned {} row(s) in {} range(s), {} match(es)",
            scanned,
            plan.ranges.len(),
            results.len()
        );
        results
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl StorageAdapter for MemoryStore {
    fn shard_prefixes(&self) -> Vec<Bytes> {
        if self.shard_count <= 1 {
            Vec::new()
        } else {
            (0..self.shard_count)
                .map(|shard| Bytes::copy_from_slice(&[shard]))
                .collect()
        }
    }
}

// BTreeMap::range panics on inverted bounds
fn is_empty_range(lower: &Bound<Bytes>, upper: &Bound<Bytes>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::time::TimePeriod;
    use chrono::{TimeZone, Utc};
    use geo::Point;

    fn keyspace() -> Z3KeySpace {
        let schema = Schema::parse("tracks", "dtg:Date,*geom:Point").unwrap();
        Z3KeySpace::new(&schema, TimePeriod::Day).unwrap()
    }

    fn record(id: &str, lon: f64) -> Record {
        Record::new(id)
            .with("geom", Point::new(lon, 0.0))
            .with("dtg", Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_write_uses_shard_prefixes() {
        let ks = keyspace();
        let mut store = MemoryStore::new(4);
        assert_eq!(store.shard_prefixes().len(), 4);

        for i in 0..20 {
            let key = store.write(&ks, record(&format!("r{}", i), i as f64)).unwrap();
            assert!(key[0] < 4);
        }
        assert_eq!(store.len(), 20);
        assert_eq!(store.scan(&ScanRange::Unbounded).len(), 20);
    }

    #[test]
    fn test_unsharded_store() {
        let ks = keyspace();
        let mut store = MemoryStore::new(1);
        assert!(store.shard_prefixes().is_empty());
        let key = store.write(&ks, record("a", 1.0)).unwrap();
        assert_eq!(key.len(), 10 + 1);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let mut store = MemoryStore::new(1);
        store.write(&keyspace(), record("a", 1.0)).unwrap();
        let inverted = ScanRange::half_open(Bytes::from_static(b"z"), Bytes::from_static(b"a"));
        assert!(store.scan(&inverted).is_empty());
    }

    #[test]
    fn test_write_rejects_missing_date() {
        let mut store = MemoryStore::new(2);
        let bad = Record::new("x").with("geom", Point::new(0.0, 0.0));
        assert!(store.write(&keyspace(), bad).is_err());
        assert!(store.is_empty());
    }
}
