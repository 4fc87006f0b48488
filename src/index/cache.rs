//! Shared cache of resolved key spaces.

use super::Z3KeySpace;
use crate::error::Result;
use crate::schema::Schema;
use crate::time::TimePeriod;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

type CacheKey = (String, u32, TimePeriod);

/// Key spaces keyed by schema name, schema version and time period.
///
/// Safe to share between planner threads. Lookups take a read lock; a miss
/// builds the key space without holding any lock and the first insert wins.
#[derive(Debug, Default)]
pub struct KeyspaceCache {
    entries: RwLock<FxHashMap<CacheKey, Arc<Z3KeySpace>>>,
}

impl KeyspaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached key space for `schema`, building it on first use.
    ///
    /// Schema errors are returned and never cached.
    pub fn get_or_init(&self, schema: &Schema, period: TimePeriod) -> Result<Arc<Z3KeySpace>> {
        let key = (schema.type_name().to_string(), schema.version(), period);
        if let Some(found) = self.entries.read().get(&key) {
            return Ok(Arc::clone(found));
        }

        let built = Arc::new(Z3KeySpace::new(schema, period)?);
        log::debug!(
            "Caching Z3 key space for '{}' v{} ({} bins)",
            schema.type_name(),
            schema.version(),
            period
        );
        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(key).or_insert(built)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every cached version of `type_name`.
    pub fn invalidate(&self, type_name: &str) {
        self.entries.write().retain(|(name, _, _), _| name != type_name);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn schema(version: u32) -> Schema {
        Schema::parse("tracks", "dtg:Date,*geom:Point")
            .unwrap()
            .with_version(version)
    }

    #[test]
    fn test_reuses_entries() {
        let cache = KeyspaceCache::new();
        let a = cache.get_or_init(&schema(1), TimePeriod::Week).unwrap();
        let b = cache.get_or_init(&schema(1), TimePeriod::Week).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        cache.get_or_init(&schema(2), TimePeriod::Week).unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate("tracks");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = KeyspaceCache::new();
        let bad = Schema::parse("bad", "*geom:Point").unwrap();
        assert!(cache.get_or_init(&bad, TimePeriod::Week).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_init_shares_one_entry() {
        let cache = Arc::new(KeyspaceCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_init(&schema(1), TimePeriod::Day).unwrap())
            })
            .collect();
        let spaces: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(spaces.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }
}
