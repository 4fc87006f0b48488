//! Binned time periods.
//!
//! A Z3 key only encodes the offset of a timestamp inside a coarse time bin;
//! the bin itself becomes a two-byte key prefix. This keeps the time
//! dimension of the curve at a fixed, small width.
//!
//! | Period | Bin | Offset unit | Max offset |
//! |--------|-----|-------------|------------|
//! | `Day`   | days since epoch   | milliseconds | 86 400 000 |
//! | `Week`  | weeks since epoch  | seconds      | 604 800    |
//! | `Month` | months since epoch | minutes      | 44 640     |
//! | `Year`  | years since epoch  | minutes      | 527 040    |
//!
//! Supported timestamps run from the Unix epoch to the end of bin `i16::MAX`.

use crate::error::{KeyspaceError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use spatio_keyspace_types::{BinnedTime, Interval};
use std::fmt;
use std::str::FromStr;

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60_000;
const MILLIS_PER_DAY: i64 = 86_400_000;
const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;
const MINUTES_PER_DAY: i64 = 1_440;

/// Width of a time bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    /// Largest offset (exclusive) a timestamp can have inside one bin.
    pub const fn max_offset(&self) -> i64 {
        match self {
            Self::Day => MILLIS_PER_DAY,
            Self::Week => MILLIS_PER_WEEK / MILLIS_PER_SECOND,
            Self::Month => 31 * MINUTES_PER_DAY,
            Self::Year => 366 * MINUTES_PER_DAY,
        }
    }

    /// Length of one offset unit in milliseconds.
    pub const fn offset_unit_millis(&self) -> i64 {
        match self {
            Self::Day => 1,
            Self::Week => MILLIS_PER_SECOND,
            Self::Month | Self::Year => MILLIS_PER_MINUTE,
        }
    }

    /// Earliest indexable timestamp.
    pub fn min_date(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    /// Latest indexable timestamp: the last millisecond of bin `i16::MAX`.
    pub fn max_date(&self) -> DateTime<Utc> {
        millis_to_date(self.max_date_millis())
    }

    fn max_date_millis(&self) -> i64 {
        self.bin_start_millis(i16::MAX as i32 + 1) - 1
    }

    /// First instant of `bin`.
    pub fn bin_start(&self, bin: i16) -> DateTime<Utc> {
        millis_to_date(self.bin_start_millis(bin as i32))
    }

    fn bin_start_millis(&self, bin: i32) -> i64 {
        match self {
            Self::Day => bin as i64 * MILLIS_PER_DAY,
            Self::Week => bin as i64 * MILLIS_PER_WEEK,
            Self::Month => month_start_millis(1970 + bin.div_euclid(12), bin.rem_euclid(12) as u32 + 1),
            Self::Year => month_start_millis(1970 + bin, 1),
        }
    }

    /// Split a timestamp into its bin and offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp is before the epoch or after
    /// [`TimePeriod::max_date`].
    pub fn to_binned_time(&self, date: &DateTime<Utc>) -> Result<BinnedTime> {
        let millis = date.timestamp_millis();
        if millis < 0 || millis > self.max_date_millis() {
            return Err(KeyspaceError::InvalidInput(format!(
                "Date {} is outside the indexable range [{}, {}] for {} bins",
                date.to_rfc3339(),
                self.min_date().to_rfc3339(),
                self.max_date().to_rfc3339(),
                self
            )));
        }

        let bin = match self {
            Self::Day => (millis / MILLIS_PER_DAY) as i32,
            Self::Week => (millis / MILLIS_PER_WEEK) as i32,
            Self::Month => (date.year() - 1970) * 12 + date.month0() as i32,
            Self::Year => date.year() - 1970,
        };
        let offset = (millis - self.bin_start_millis(bin)) / self.offset_unit_millis();

        Ok(BinnedTime::new(bin as i16, offset))
    }

    /// Rebuild a timestamp from a bin and offset, truncated to the offset unit.
    pub fn from_binned_time(&self, binned: BinnedTime) -> DateTime<Utc> {
        millis_to_date(
            self.bin_start_millis(binned.bin as i32) + binned.offset * self.offset_unit_millis(),
        )
    }

    /// Clamp an interval to the indexable range at millisecond resolution.
    ///
    /// Row keys floor instants to whole milliseconds. An exclusive upper end
    /// is rounded up and then moved one millisecond inwards; an exclusive
    /// lower end keeps the millisecond that holds it, since later instants in
    /// that millisecond still match.
    ///
    /// Returns `None` if no indexable instant is left.
    pub fn bounds_to_indexable(
        &self,
        interval: &Interval<DateTime<Utc>>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let min = 0;
        let max = self.max_date_millis();

        let lower = match &interval.lower().value {
            None => min,
            Some(v) if interval.lower().inclusive => v.timestamp_millis(),
            Some(v) => v.timestamp_millis(),
        };
        let upper = match &interval.upper().value {
            None => max,
            Some(v) if interval.upper().inclusive => v.timestamp_millis(),
            Some(v) => ceil_millis(v).saturating_sub(1),
        };

        let (lower, upper) = (lower.max(min), upper.min(max));
        (lower <= upper).then(|| (millis_to_date(lower), millis_to_date(upper)))
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        };
        f.write_str(name)
    }
}

impl FromStr for TimePeriod {
    type Err = KeyspaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(KeyspaceError::Config(format!(
                "Unknown time period '{}', expected day, week, month or year",
                other
            ))),
        }
    }
}

fn month_start_millis(year: i32, month: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
        .unwrap_or(i64::MAX)
}

fn ceil_millis(date: &DateTime<Utc>) -> i64 {
    let millis = date.timestamp_millis();
    if date.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.saturating_add(1)
    }
}

fn millis_to_date(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_epoch_is_bin_zero() {
        for period in TimePeriod::ALL {
            let binned = period.to_binned_time(&DateTime::<Utc>::UNIX_EPOCH).unwrap();
            assert_eq!(binned, BinnedTime::new(0, 0), "{}", period);
        }
    }

    #[test]
    fn test_week_bins() {
        // 1970-01-08 is the first instant of week 1
        let binned = TimePeriod::Week
            .to_binned_time(&date(1970, 1, 8, 0, 0, 1))
            .unwrap();
        assert_eq!(binned, BinnedTime::new(1, 1));
    }

    #[test]
    fn test_month_bins_follow_calendar() {
        let binned = TimePeriod::Month
            .to_binned_time(&date(2017, 3, 2, 1, 0, 0))
            .unwrap();
        assert_eq!(binned.bin, (2017 - 1970) * 12 + 2);
        assert_eq!(binned.offset, MINUTES_PER_DAY + 60);
        assert_eq!(
            TimePeriod::Month.bin_start(binned.bin),
            date(2017, 3, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_roundtrip_all_periods() {
        let samples = [
            date(1970, 1, 1, 0, 0, 0),
            date(2017, 1, 1, 12, 30, 0),
            date(2024, 2, 29, 23, 59, 0),
            date(2031, 12, 31, 23, 59, 0),
        ];
        for period in TimePeriod::ALL {
            for sample in samples {
                let binned = period.to_binned_time(&sample).unwrap();
                assert!(binned.offset >= 0 && binned.offset < period.max_offset());
                assert_eq!(period.from_binned_time(binned), sample, "{}", period);
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        let before_epoch = date(1969, 12, 31, 23, 59, 59);
        assert!(TimePeriod::Week.to_binned_time(&before_epoch).is_err());

        let max = TimePeriod::Day.max_date();
        assert_eq!(TimePeriod::Day.to_binned_time(&max).unwrap().bin, i16::MAX);
        let past_max = max + chrono::Duration::milliseconds(1);
        assert!(TimePeriod::Day.to_binned_time(&past_max).is_err());
    }

    #[test]
    fn test_bounds_to_indexable() {
        let t1 = date(2017, 1, 1, 0, 0, 0);
        let t2 = date(2017, 1, 2, 0, 0, 0);

        let open = Interval::open(t1, t2).unwrap();
        let (lo, hi) = TimePeriod::Week.bounds_to_indexable(&open).unwrap();
        assert_eq!(lo, t1);
        assert_eq!(hi, t2 - chrono::Duration::milliseconds(1));

        let unbounded = Interval::everything();
        let (lo, hi) = TimePeriod::Week.bounds_to_indexable(&unbounded).unwrap();
        assert_eq!(lo, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(hi, TimePeriod::Week.max_date());

        let before_epoch = Interval::less_than(date(1960, 1, 1, 0, 0, 0));
        assert!(TimePeriod::Week.bounds_to_indexable(&before_epoch).is_none());
    }

    #[test]
    fn test_sub_millisecond_bounds_keep_matching_instants() {
        let t1 = date(2017, 1, 1, 0, 0, 0) + chrono::Duration::microseconds(1_500);
        let t2 = date(2017, 1, 2, 0, 0, 0) + chrono::Duration::microseconds(2_700);
        let open = Interval::open(t1, t2).unwrap();
        let (lo, hi) = TimePeriod::Day.bounds_to_indexable(&open).unwrap();

        // instants just inside each end key to the millisecond they fall in
        let after_lower = t1 + chrono::Duration::microseconds(100);
        let before_upper = t2 - chrono::Duration::microseconds(100);
        let key = |d: DateTime<Utc>| TimePeriod::Day.to_binned_time(&d).unwrap();
        for instant in [after_lower, before_upper] {
            assert!(key(lo) <= key(instant) && key(instant) <= key(hi), "{}", instant);
        }
        assert_eq!(hi, date(2017, 1, 2, 0, 0, 0) + chrono::Duration::milliseconds(2));
    }

    #[test]
    fn test_parse_period() {
        assert_eq!("Month".parse::<TimePeriod>().unwrap(), TimePeriod::Month);
        assert!("fortnight".parse::<TimePeriod>().is_err());
    }
}
