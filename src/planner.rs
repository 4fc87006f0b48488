//! Query planning.
//!
//! The planner turns a filter into scan ranges over the Z3 key space:
//!
//! 1. resolve the schema's key space (cached per schema version),
//! 2. extract geometry extents and time intervals from the filter,
//! 3. short-circuit to an empty plan when either is disjoint,
//! 4. fall back to a guarded full table scan when neither constrains
//!    anything,
//! 5. group intervals into time bins and decompose every bin into z ranges,
//!    once per shard prefix,
//! 6. decide whether the scanned rows need a residual filter.

use crate::config::{IndexKind, PlannerConfig, QueryHints};
use crate::error::{KeyspaceError, Result};
use crate::filter::{Expr, Filter, extract_extent, extract_intervals};
use crate::index::{KeyspaceCache, Z3KeySpace};
use crate::schema::Schema;
use crate::storage::StorageAdapter;
use serde::{Deserialize, Serialize};
use spatio_keyspace_types::{FilterValues, GeometryExtent, Interval, ScanRange};
use std::fmt;
use std::sync::Arc;

/// Static cost of a Z3 scan constrained in space and time.
pub const SPATIO_TEMPORAL_COST: u64 = 200;

/// Static cost of a Z3 scan constrained in only one of space or time.
pub const SINGLE_DIMENSION_COST: u64 = 400;

/// Cost of scanning the whole table.
pub const FULL_SCAN_COST: u64 = u64::MAX;

/// Row count estimates used to compare strategies.
pub trait StatsProvider: Send + Sync {
    /// Estimated number of rows matching `filter`, `None` if unknown.
    fn estimate_count(&self, schema: &Schema, filter: &Filter) -> Option<u64>;
}

/// Strategy a plan scans with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Z3,
    FullTable,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Z3 => write!(f, "z3"),
            Self::FullTable => write!(f, "full-table"),
        }
    }
}

/// Scan ranges for one query plus the filter still to apply to each row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub strategy: StrategyKind,
    /// Ranges to scan, unordered; ranges may overlap.
    pub ranges: Vec<ScanRange>,
    /// Filter to apply to scanned rows, `None` if every row in range matches
    /// or approximate results were accepted.
    pub residual_filter: Option<Filter>,
    pub strategy_cost: u64,
    /// Whether the extracted bounds describe the filter exactly.
    pub precise: bool,
}

impl QueryPlan {
    /// A plan matching nothing.
    pub fn empty(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ranges: Vec::new(),
            residual_filter: None,
            strategy_cost: 0,
            precise: true,
        }
    }

    pub fn requires_residual(&self) -> bool {
        self.residual_filter.is_some()
    }

    /// True when the plan scans nothing.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Plans queries against a store described by a [`StorageAdapter`].
pub struct QueryPlanner<A: StorageAdapter> {
    config: PlannerConfig,
    adapter: A,
    stats: Option<Box<dyn StatsProvider>>,
    cache: Arc<KeyspaceCache>,
}

impl<A: StorageAdapter> QueryPlanner<A> {
    /// # Errors
    ///
    /// Returns [`KeyspaceError::Config`] if `config` does not validate.
    pub fn new(config: PlannerConfig, adapter: A) -> Result<Self> {
        config.validate().map_err(KeyspaceError::Config)?;
        Ok(Self {
            config,
            adapter,
            stats: None,
            cache: Arc::new(KeyspaceCache::new()),
        })
    }

    pub fn with_stats(mut self, stats: impl StatsProvider + 'static) -> Self {
        self.stats = Some(Box::new(stats));
        self
    }

    /// Share a key-space cache with other planners.
    pub fn with_cache(mut self, cache: Arc<KeyspaceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn cache(&self) -> &Arc<KeyspaceCache> {
        &self.cache
    }

    /// Key space for `schema` under this planner's time period.
    pub fn keyspace(&self, schema: &Schema) -> Result<Arc<Z3KeySpace>> {
        self.cache.get_or_init(schema, self.config.time_period)
    }

    /// Plan `filter` against `schema`.
    ///
    /// # Errors
    ///
    /// - [`KeyspaceError::Schema`] if the Z3 index was requested and the
    ///   schema cannot support it
    /// - [`KeyspaceError::FullScanBlocked`] if the plan would scan the whole
    ///   table and the caller did not opt in
    pub fn plan_query(&self, schema: &Schema, filter: &Filter, hints: &QueryHints) -> Result<QueryPlan> {
        if hints.requested_index == Some(IndexKind::FullTable) {
            return self.full_table_plan(schema, filter, hints);
        }

        let keyspace = match self.keyspace(schema) {
            Ok(keyspace) => keyspace,
            Err(e) if hints.requested_index == Some(IndexKind::Z3) => return Err(e),
            Err(e) => {
                log::warn!("Z3 index unavailable for '{}': {}", schema.type_name(), e);
                return self.full_table_plan(schema, filter, hints);
            }
        };

        let extents = extract_extent(filter, keyspace.geom_field());
        let intervals = extract_intervals(filter, keyspace.dtg_field());

        if extents.disjoint || intervals.disjoint {
            log::debug!("Filter on '{}' is disjoint: {}", schema.type_name(), filter);
            return Ok(QueryPlan::empty(StrategyKind::Z3));
        }

        let has_spatial = extents.iter().any(|e| !e.is_world());
        let has_temporal = intervals.iter().any(|i| !i.is_everything());
        if !has_spatial && !has_temporal && hints.requested_index != Some(IndexKind::Z3) {
            return self.full_table_plan(schema, filter, hints);
        }

        let cost = self.estimate(schema, filter).unwrap_or(if has_spatial && has_temporal {
            SPATIO_TEMPORAL_COST
        } else {
            SINGLE_DIMENSION_COST
        });
        if cost >= FULL_SCAN_COST && hints.requested_index.is_none() {
            return self.full_table_plan(schema, filter, hints);
        }

        let precise = extents.precise && intervals.precise;
        let extents = if has_spatial {
            extents.values
        } else {
            vec![GeometryExtent::world()]
        };
        let intervals = if has_temporal {
            intervals
        } else {
            FilterValues::new(vec![Interval::everything()])
        };

        let values = keyspace.index_values(extents, &intervals, self.config.max_bins);
        if values.is_empty() {
            log::debug!(
                "No indexable time range for '{}': {}",
                schema.type_name(),
                filter
            );
            return Ok(QueryPlan::empty(StrategyKind::Z3));
        }

        let target = hints.target_ranges.unwrap_or(self.config.target_ranges);
        let ranges = keyspace.scan_ranges(
            &values,
            &self.adapter.shard_prefixes(),
            self.config.precision_bits,
            target,
            self.config.max_recurse,
            self.config.range_end,
        );

        let approximate = self.config.allow_approximate
            && precise
            && is_loose_bbox(filter, keyspace.geom_field(), keyspace.dtg_field());
        let residual_filter = (!approximate).then(|| filter.clone());

        log::debug!(
            "Planned '{}' with z3: {} bin(s), {} bin span(s), {} range(s), cost {}, precise {}",
            schema.type_name(),
            values.bins.len(),
            values.bin_spans.len(),
            ranges.len(),
            cost,
            precise
        );

        Ok(QueryPlan {
            strategy: StrategyKind::Z3,
            ranges,
            residual_filter,
            strategy_cost: cost,
            precise,
        })
    }

    fn estimate(&self, schema: &Schema, filter: &Filter) -> Option<u64> {
        self.stats.as_ref()?.estimate_count(schema, filter)
    }

    fn full_table_plan(&self, schema: &Schema, filter: &Filter, hints: &QueryHints) -> Result<QueryPlan> {
        if self.config.block_full_table_scans && !hints.allow_full_scan {
            return Err(KeyspaceError::FullScanBlocked {
                type_name: schema.type_name().to_string(),
            });
        }
        log::warn!(
            "Full table scan of '{}' for filter: {}",
            schema.type_name(),
            filter
        );

        let residual_filter = (*filter != Filter::Include).then(|| filter.clone());
        Ok(QueryPlan {
            strategy: StrategyKind::FullTable,
            ranges: vec![ScanRange::Unbounded],
            precise: residual_filter.is_none(),
            residual_filter,
            strategy_cost: FULL_SCAN_COST,
        })
    }
}

/// Whether `filter` only holds bounding boxes on the geometry attribute and
/// literal comparisons on the date attribute, combined with AND.
fn is_loose_bbox(filter: &Filter, geom: &str, dtg: &str) -> bool {
    let literal_against = |left: &Expr, right: &Expr| {
        (left.is_property(dtg) && right.as_literal().is_some())
            || (right.is_property(dtg) && left.as_literal().is_some())
    };
    match filter {
        Filter::And(children) => children.iter().all(|c| is_loose_bbox(c, geom, dtg)),
        Filter::BBox { expr, .. } => expr.is_property(geom),
        Filter::Compare { left, right, .. } | Filter::Temporal { left, right, .. } => {
            literal_against(left, right)
        }
        Filter::Between { expr, lower, upper } => {
            expr.is_property(dtg) && lower.as_literal().is_some() && upper.as_literal().is_some()
        }
        _ => false,
    }
}
