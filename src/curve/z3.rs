//! The Z3 curve: longitude, latitude and time offset within a bin.

use super::dimension::NormalizedDimension;
use super::zorder::{self, BITS_PER_DIMENSION, IndexRange, Z3, ZBox};
use crate::error::{KeyspaceError, Result};
use crate::time::TimePeriod;
use once_cell::sync::Lazy;
use spatio_keyspace_types::GeometryExtent;

static DAY: Lazy<Z3Sfc> = Lazy::new(|| Z3Sfc::new(TimePeriod::Day));
static WEEK: Lazy<Z3Sfc> = Lazy::new(|| Z3Sfc::new(TimePeriod::Week));
static MONTH: Lazy<Z3Sfc> = Lazy::new(|| Z3Sfc::new(TimePeriod::Month));
static YEAR: Lazy<Z3Sfc> = Lazy::new(|| Z3Sfc::new(TimePeriod::Year));

/// Z3 space-filling curve for one time period.
#[derive(Debug, Clone, PartialEq)]
pub struct Z3Sfc {
    period: TimePeriod,
    lon: NormalizedDimension,
    lat: NormalizedDimension,
    time: NormalizedDimension,
}

impl Z3Sfc {
    pub fn new(period: TimePeriod) -> Self {
        Self {
            period,
            lon: NormalizedDimension::lon(BITS_PER_DIMENSION),
            lat: NormalizedDimension::lat(BITS_PER_DIMENSION),
            time: NormalizedDimension::time(period.max_offset(), BITS_PER_DIMENSION),
        }
    }

    /// Shared curve for `period`.
    pub fn for_period(period: TimePeriod) -> &'static Z3Sfc {
        match period {
            TimePeriod::Day => &DAY,
            TimePeriod::Week => &WEEK,
            TimePeriod::Month => &MONTH,
            TimePeriod::Year => &YEAR,
        }
    }

    pub fn period(&self) -> TimePeriod {
        self.period
    }

    /// Encode a position and bin offset.
    ///
    /// # Errors
    ///
    /// Out-of-range values are an error unless `lenient` is set, in which
    /// case they are clamped to the domain.
    pub fn index(&self, lon: f64, lat: f64, offset: i64, lenient: bool) -> Result<u64> {
        if !lenient {
            let in_range = |v: f64, d: &NormalizedDimension| v >= d.min() && v <= d.max();
            if !in_range(lon, &self.lon)
                || !in_range(lat, &self.lat)
                || !in_range(offset as f64, &self.time)
            {
                return Err(KeyspaceError::InvalidInput(format!(
                    "Value(s) out of bounds ([{}, {}], [{}, {}], [{}, {}]): {}, {}, {}",
                    self.lon.min(),
                    self.lon.max(),
                    self.lat.min(),
                    self.lat.max(),
                    self.time.min(),
                    self.time.max(),
                    lon,
                    lat,
                    offset
                )));
            }
        }
        Ok(Z3::new(
            self.lon.normalize(lon),
            self.lat.normalize(lat),
            self.time.normalize(offset as f64),
        )
        .0)
    }

    /// Strict [`Z3Sfc::index`].
    pub fn encode(&self, lon: f64, lat: f64, offset: i64) -> Result<u64> {
        self.index(lon, lat, offset, false)
    }

    /// [`Z3Sfc::ranges`] with the default recursion depth.
    pub fn decompose_ranges(
        &self,
        extents: &[GeometryExtent],
        time_chunks: &[(i64, i64)],
        precision_bits: u32,
        target_ranges: usize,
    ) -> Vec<IndexRange> {
        self.ranges(extents, time_chunks, precision_bits, Some(target_ranges), None)
    }

    /// Centre of the cell `z` falls in, as (lon, lat, offset).
    pub fn invert(&self, z: u64) -> (f64, f64, i64) {
        let (x, y, t) = Z3(z).decode();
        (
            self.lon.denormalize(x),
            self.lat.denormalize(y),
            self.time.denormalize(t).floor() as i64,
        )
    }

    /// Decompose boxes crossed with time chunks into z ranges.
    ///
    /// `time_chunks` are inclusive offset pairs within one bin. Either input
    /// being empty yields no ranges.
    pub fn ranges(
        &self,
        boxes: &[GeometryExtent],
        time_chunks: &[(i64, i64)],
        precision_bits: u32,
        target_ranges: Option<usize>,
        max_recurse: Option<usize>,
    ) -> Vec<IndexRange> {
        let queries: Vec<ZBox> = boxes
            .iter()
            .flat_map(|b| {
                time_chunks.iter().map(move |(t0, t1)| {
                    ZBox::new(
                        [
                            self.lon.normalize(b.min_x()),
                            self.lat.normalize(b.min_y()),
                            self.time.normalize(*t0 as f64),
                        ],
                        [
                            self.lon.normalize(b.max_x()),
                            self.lat.normalize(b.max_y()),
                            self.time.normalize(*t1 as f64),
                        ],
                    )
                })
            })
            .collect();

        zorder::zranges(&queries, precision_bits, target_ranges, max_recurse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_for_period_is_shared() {
        let a = Z3Sfc::for_period(TimePeriod::Week);
        let b = Z3Sfc::for_period(TimePeriod::Week);
        assert!(std::ptr::eq(a, b));
        assert_eq!(Z3Sfc::for_period(TimePeriod::Day).period(), TimePeriod::Day);
    }

    #[test]
    fn test_index_bounds() {
        let sfc = Z3Sfc::for_period(TimePeriod::Week);
        assert!(sfc.encode(181.0, 0.0, 0).is_err());
        assert!(sfc.index(0.0, -91.0, 0, false).is_err());
        assert!(sfc.index(0.0, 0.0, TimePeriod::Week.max_offset() + 1, false).is_err());
        assert_eq!(
            sfc.index(181.0, 0.0, 0, true).unwrap(),
            sfc.index(180.0, 0.0, 0, false).unwrap()
        );
    }

    #[test]
    fn test_empty_inputs() {
        let sfc = Z3Sfc::for_period(TimePeriod::Week);
        let world = [GeometryExtent::world()];
        assert!(sfc.ranges(&world, &[], 63, Some(10), None).is_empty());
        assert!(sfc.ranges(&[], &[(0, 10)], 63, Some(10), None).is_empty());
    }

    #[test]
    fn test_whole_domain_budget() {
        let sfc = Z3Sfc::for_period(TimePeriod::Week);
        let ranges = sfc.decompose_ranges(
            &[GeometryExtent::world()],
            &[(0, TimePeriod::Week.max_offset())],
            63,
            10,
        );
        assert!(!ranges.is_empty() && ranges.len() <= 10);
    }

    proptest! {
        #[test]
        fn prop_invert_within_one_cell(
            lon in -180.0f64..=180.0,
            lat in -90.0f64..=90.0,
            t in 0i64..=604_800,
        ) {
            let sfc = Z3Sfc::for_period(TimePeriod::Week);
            let z = sfc.index(lon, lat, t, false).unwrap();
            let (x, y, offset) = sfc.invert(z);
            prop_assert!((x - lon).abs() <= 360.0 / (1u64 << 21) as f64);
            prop_assert!((y - lat).abs() <= 180.0 / (1u64 << 21) as f64);
            prop_assert!((offset - t).abs() <= 1);
        }

        #[test]
        fn prop_point_in_query_is_covered(
            (x0, x1) in (-180.0f64..180.0, -180.0f64..180.0).prop_map(|(a, b)| (a.min(b), a.max(b))),
            (y0, y1) in (-90.0f64..90.0, -90.0f64..90.0).prop_map(|(a, b)| (a.min(b), a.max(b))),
            (t0, t1) in (0i64..604_800, 0i64..604_800).prop_map(|(a, b)| (a.min(b), a.max(b))),
            (fx, fy, ft) in (0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0),
            target in 1usize..100,
        ) {
            let sfc = Z3Sfc::for_period(TimePeriod::Week);
            let lon = x0 + (x1 - x0) * fx;
            let lat = y0 + (y1 - y0) * fy;
            let t = t0 + ((t1 - t0) as f64 * ft) as i64;
            let z = sfc.index(lon, lat, t, false).unwrap();

            let extent = GeometryExtent::new(x0, y0, x1, y1);
            let ranges = sfc.ranges(&[extent], &[(t0, t1)], 63, Some(target), None);
            prop_assert!(ranges.iter().any(|r| r.contains(z)));
        }
    }
}
