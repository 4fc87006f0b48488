//! Z3 key space: row keys for records and scan ranges for queries.
//!
//! Row keys are `[shard][bin: i16 BE][z: u64 BE][record id]`. Records are
//! spread over shards by a hash of their id, so every query range is
//! emitted once per shard prefix.

pub mod cache;

use crate::config::RangeEnd;
use crate::curve::{IndexRange, Z3Sfc};
use crate::error::{KeyspaceError, Result};
use crate::filter::evaluate::record_geometry;
use crate::record::Record;
use crate::schema::{AttributeType, Schema};
use crate::time::TimePeriod;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use geo::Geometry;
use rustc_hash::FxHasher;
use spatio_keyspace_types::key::following_prefix;
use spatio_keyspace_types::{FilterValues, GeometryExtent, Interval, ScanRange, Z3IndexKey};
use std::collections::BTreeMap;
use std::hash::Hasher;

pub use cache::KeyspaceCache;

/// Shard index for a record id.
pub fn shard_for(id: &str, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    let mut hasher = FxHasher::default();
    hasher.write(id.as_bytes());
    (hasher.finish() % shard_count as u64) as usize
}

/// Query values for the Z3 index, grouped by time bin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Z3IndexValues {
    pub extents: Vec<GeometryExtent>,
    /// Inclusive offset ranges per bin.
    pub bins: BTreeMap<i16, Vec<(i64, i64)>>,
    /// Inclusive bin spans scanned whole, for half-open intervals and
    /// intervals covering too many bins.
    pub bin_spans: Vec<(i16, i16)>,
}

impl Z3IndexValues {
    /// True when no time range is indexable, so nothing can match.
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty() || (self.bins.is_empty() && self.bin_spans.is_empty())
    }
}

/// Z3 index parameters resolved for one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Z3KeySpace {
    type_name: String,
    geom_field: String,
    dtg_field: String,
    sfc: &'static Z3Sfc,
}

impl Z3KeySpace {
    /// # Errors
    ///
    /// Returns [`KeyspaceError::Schema`] if the schema lacks a point geometry
    /// or a date attribute.
    pub fn new(schema: &Schema, period: TimePeriod) -> Result<Self> {
        let geom_field = schema.geom_field().ok_or_else(|| {
            KeyspaceError::Schema(format!(
                "Z3 index on '{}' requires a geometry attribute",
                schema.type_name()
            ))
        })?;
        if schema.binding(geom_field) != Some(AttributeType::Point) {
            return Err(KeyspaceError::Schema(format!(
                "Z3 index on '{}' requires a point geometry, '{}' is not a Point",
                schema.type_name(),
                geom_field
            )));
        }
        let dtg_field = schema.dtg_field().ok_or_else(|| {
            KeyspaceError::Schema(format!(
                "Z3 index on '{}' requires a date attribute",
                schema.type_name()
            ))
        })?;

        Ok(Self {
            type_name: schema.type_name().to_string(),
            geom_field: geom_field.to_string(),
            dtg_field: dtg_field.to_string(),
            sfc: Z3Sfc::for_period(period),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn geom_field(&self) -> &str {
        &self.geom_field
    }

    pub fn dtg_field(&self) -> &str {
        &self.dtg_field
    }

    pub fn period(&self) -> TimePeriod {
        self.sfc.period()
    }

    pub fn sfc(&self) -> &'static Z3Sfc {
        self.sfc
    }

    /// Index key of a record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyspaceError::InvalidInput`] when the record has no point
    /// geometry or date, or when either is outside the indexable domain.
    pub fn index_key(&self, record: &Record) -> Result<Z3IndexKey> {
        let point = match record_geometry(record, &self.geom_field) {
            Some(Geometry::Point(p)) => *p,
            _ => {
                return Err(KeyspaceError::InvalidInput(format!(
                    "Record '{}' has no point geometry in '{}'",
                    record.id, self.geom_field
                )));
            }
        };
        let date = record
            .get(&self.dtg_field)
            .and_then(|v| v.as_date())
            .ok_or_else(|| {
                KeyspaceError::InvalidInput(format!(
                    "Record '{}' has no date in '{}'",
                    record.id, self.dtg_field
                ))
            })?;

        let binned = self.period().to_binned_time(&date)?;
        let z = self.sfc.index(point.x(), point.y(), binned.offset, false)?;
        Ok(Z3IndexKey::new(binned.bin, z))
    }

    pub fn row_key(&self, record: &Record, shard: &[u8]) -> Result<Bytes> {
        Ok(self.index_key(record)?.row_key(shard, &record.id))
    }

    /// Group extents and time intervals into per-bin query values.
    ///
    /// Bounded intervals spanning at most `max_bins` bins are split into a
    /// partial first bin, whole middle bins and a partial last bin. Other
    /// intervals become coarse bin spans. Intervals outside the indexable
    /// range are dropped.
    pub fn index_values(
        &self,
        extents: Vec<GeometryExtent>,
        intervals: &FilterValues<Interval<DateTime<Utc>>>,
        max_bins: usize,
    ) -> Z3IndexValues {
        let period = self.period();
        let whole_bin = (0, period.max_offset());

        let (bins, bin_spans) = intervals.iter().fold(
            (BTreeMap::<i16, Vec<(i64, i64)>>::new(), Vec::new()),
            |(mut bins, mut spans), interval| {
                let Some((lower, upper)) = period.bounds_to_indexable(interval) else {
                    log::debug!("Dropping interval outside the indexable range: {:?}", interval);
                    return (bins, spans);
                };
                let (Ok(lb), Ok(ub)) = (
                    period.to_binned_time(&lower),
                    period.to_binned_time(&upper),
                ) else {
                    return (bins, spans);
                };

                let bin_count = (ub.bin as i64 - lb.bin as i64 + 1) as usize;
                if !interval.is_bounded_both_sides() || bin_count > max_bins {
                    spans.push((lb.bin, ub.bin));
                } else if lb.bin == ub.bin {
                    bins.entry(lb.bin).or_default().push((lb.offset, ub.offset));
                } else {
                    bins.entry(lb.bin).or_default().push((lb.offset, whole_bin.1));
                    for bin in lb.bin + 1..ub.bin {
                        bins.entry(bin).or_default().push(whole_bin);
                    }
                    bins.entry(ub.bin).or_default().push((0, ub.offset));
                }
                (bins, spans)
            },
        );

        Z3IndexValues {
            extents,
            bins,
            bin_spans,
        }
    }

    /// Scan ranges covering `values`, once per shard prefix.
    ///
    /// The range target is divided evenly between bins.
    pub fn scan_ranges(
        &self,
        values: &Z3IndexValues,
        shard_prefixes: &[Bytes],
        precision_bits: u32,
        target_ranges: usize,
        max_recurse: usize,
        range_end: RangeEnd,
    ) -> Vec<ScanRange> {
        let default_shard = [Bytes::new()];
        let shards = if shard_prefixes.is_empty() {
            &default_shard[..]
        } else {
            shard_prefixes
        };

        let per_bin_target = (target_ranges / values.bins.len().max(1)).max(1);
        let mut ranges = Vec::new();

        for (bin, chunks) in &values.bins {
            let z_ranges = self.sfc.ranges(
                &values.extents,
                chunks,
                precision_bits,
                Some(per_bin_target),
                Some(max_recurse),
            );
            log::trace!("Bin {}: {} chunk(s), {} z range(s)", bin, chunks.len(), z_ranges.len());
            for range in &z_ranges {
                ranges.extend(shards.iter().map(|shard| z_scan_range(shard, *bin, range, range_end)));
            }
        }

        if !values.extents.is_empty() {
            for (lower, upper) in &values.bin_spans {
                ranges.extend(
                    shards
                        .iter()
                        .map(|shard| span_scan_range(shard, *lower, *upper, range_end)),
                );
            }
        }

        ranges
    }
}

fn key_prefix(shard: &[u8], bin: i16, z: Option<u64>) -> BytesMut {
    let mut key = BytesMut::with_capacity(shard.len() + Z3IndexKey::LENGTH);
    key.put_slice(shard);
    key.put_i16(bin);
    if let Some(z) = z {
        key.put_u64(z);
    }
    key
}

fn z_scan_range(shard: &[u8], bin: i16, range: &IndexRange, range_end: RangeEnd) -> ScanRange {
    let lower = key_prefix(shard, bin, Some(range.lower)).freeze();
    match range_end {
        // z never reaches 2^63, so the increment cannot overflow
        RangeEnd::Exclusive => {
            ScanRange::half_open(lower, key_prefix(shard, bin, Some(range.upper + 1)).freeze())
        }
        RangeEnd::InclusivePrefix => {
            ScanRange::through_prefix(lower, key_prefix(shard, bin, Some(range.upper)).freeze())
        }
    }
}

fn span_scan_range(shard: &[u8], lower: i16, upper: i16, range_end: RangeEnd) -> ScanRange {
    let start = key_prefix(shard, lower, None).freeze();
    let last = key_prefix(shard, upper, None).freeze();
    match (range_end, following_prefix(&last)) {
        (RangeEnd::Exclusive, Some(end)) => ScanRange::half_open(start, end),
        _ => ScanRange::through_prefix(start, last),
    }
}
