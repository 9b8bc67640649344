//! Timestamps and time windows.
//!
//! [`NanoTime`] mirrors the field layout of miniSEED headers (year,
//! day-of-year, time of day, nanoseconds); [`BTime`] is the v2 fixed-header
//! variant with 0.0001 s ticks. Both convert to [`OffsetDateTime`], the
//! instant type used by segments and traces.

use std::fmt;

use time::{Date, Duration, OffsetDateTime};

use crate::{MseedError, Result};

/// Nanosecond-precision header timestamp (year + day-of-year + time).
///
/// For v2, the sub-second precision is limited to 0.1 ms (100 µs), stored
/// in the `nanosecond` field as a multiple of 100,000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanoTime {
    pub year: u16,
    pub day: u16,        // 1-366
    pub hour: u8,        // 0-23
    pub minute: u8,      // 0-59
    pub second: u8,      // 0-60 (60 for leap second)
    pub nanosecond: u32, // 0-999_999_999
}

impl NanoTime {
    /// 1970-001 00:00:00.000000000
    pub fn epoch() -> Self {
        Self {
            year: 1970,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            nanosecond: 0,
        }
    }

    /// Converts the 0.0001-second fractional field to nanoseconds.
    pub fn from_btime(bt: &BTime) -> Self {
        Self {
            year: bt.year,
            day: bt.day,
            hour: bt.hour,
            minute: bt.minute,
            second: bt.second,
            nanosecond: bt.fract as u32 * 100_000,
        }
    }

    /// Nanosecond precision is truncated to 0.0001-second units.
    pub fn to_btime(self) -> BTime {
        BTime {
            year: self.year,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            fract: (self.nanosecond / 100_000) as u16,
        }
    }

    /// Convert to a UTC instant.
    ///
    /// A leap second (`second == 60`) maps onto the first instant of the
    /// following minute.
    pub fn to_datetime(self) -> Result<OffsetDateTime> {
        let date = Date::from_ordinal_date(self.year as i32, self.day)
            .map_err(|e| MseedError::InvalidTime(format!("{self}: {e}")))?;
        let (second, leap) = if self.second == 60 { (59, 1) } else { (self.second, 0) };
        let datetime = date
            .with_hms_nano(self.hour, self.minute, second, self.nanosecond)
            .map_err(|e| MseedError::InvalidTime(format!("{self}: {e}")))?
            .assume_utc();
        datetime
            .checked_add(Duration::seconds(leap))
            .ok_or_else(|| MseedError::InvalidTime(format!("{self}: leap second past the last instant")))
    }

    /// Header fields of a UTC instant.
    pub fn from_datetime(dt: OffsetDateTime) -> Result<Self> {
        let year = u16::try_from(dt.year())
            .map_err(|_| MseedError::InvalidTime(format!("year {} out of range", dt.year())))?;
        Ok(Self {
            year,
            day: dt.ordinal(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            nanosecond: dt.nanosecond(),
        })
    }
}

impl Default for NanoTime {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for NanoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:03} {:02}:{:02}:{:02}.{:09}",
            self.year, self.day, self.hour, self.minute, self.second, self.nanosecond
        )
    }
}

impl From<BTime> for NanoTime {
    fn from(bt: BTime) -> Self {
        Self::from_btime(&bt)
    }
}

impl From<NanoTime> for BTime {
    fn from(nt: NanoTime) -> Self {
        nt.to_btime()
    }
}

/// BTIME timestamp (10 bytes in the miniSEED v2 fixed header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTime {
    pub year: u16,
    pub day: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub fract: u16, // 0.0001 second units
}

impl fmt::Display for BTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:03} {:02}:{:02}:{:02}.{:04}",
            self.year, self.day, self.hour, self.minute, self.second, self.fract
        )
    }
}

/// ISO 8601 rendering with nanoseconds, e.g. `2019-07-06T03:19:53.000000000Z`.
pub fn format_iso(dt: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.nanosecond()
    )
}

/// Duration of `seconds`, rounded to the nearest nanosecond.
pub fn seconds(seconds: f64) -> Duration {
    Duration::nanoseconds((seconds * 1e9).round() as i64)
}

/// Time of sample `index` after `start` at `rate` Hz, or `None` when it
/// falls outside the representable range. Without a rate every sample sits
/// at `start`.
pub fn checked_sample_time(start: OffsetDateTime, index: usize, rate: f64) -> Option<OffsetDateTime> {
    if rate <= 0.0 || index == 0 {
        return Some(start);
    }
    start.checked_add(seconds(index as f64 / rate))
}

/// Like [`checked_sample_time`], clamped to the representable range.
pub fn sample_time(start: OffsetDateTime, index: usize, rate: f64) -> OffsetDateTime {
    if rate <= 0.0 || index == 0 {
        return start;
    }
    start.saturating_add(seconds(index as f64 / rate))
}

/// Time of the last of `num_samples` samples, failing when it cannot be
/// represented.
pub(crate) fn checked_end_time(start: OffsetDateTime, num_samples: usize, rate: f64) -> Result<OffsetDateTime> {
    checked_sample_time(start, num_samples.saturating_sub(1), rate).ok_or_else(|| {
        MseedError::InvalidTime(format!(
            "{num_samples} samples at {rate} Hz from {} end past the last instant",
            format_iso(start)
        ))
    })
}

/// A closed time interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl TimeWindow {
    /// Build a window; the bounds are swapped if given in reverse.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// The window of `duration` starting at `start`.
    pub fn after(start: OffsetDateTime, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// The window of `duration` ending at `end`.
    pub fn before(end: OffsetDateTime, duration: Duration) -> Self {
        Self::new(end - duration, end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, t: OffsetDateTime) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The smallest window covering both.
    pub fn union(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_iso(self.start), format_iso(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_btime_to_nanotime_roundtrip() {
        let bt = BTime {
            year: 2024,
            day: 15,
            hour: 10,
            minute: 30,
            second: 45,
            fract: 1234,
        };
        let nt = NanoTime::from_btime(&bt);
        assert_eq!(nt.nanosecond, 123_400_000);
        assert_eq!(nt.to_btime(), bt);
    }

    #[test]
    fn test_to_datetime() {
        let nt = NanoTime {
            year: 2019,
            day: 187,
            hour: 3,
            minute: 19,
            second: 53,
            nanosecond: 250_000_000,
        };
        assert_eq!(nt.to_datetime().unwrap(), datetime!(2019-07-06 03:19:53.25 UTC));
        assert_eq!(NanoTime::from_datetime(nt.to_datetime().unwrap()).unwrap(), nt);
    }

    #[test]
    fn test_leap_second_rolls_over() {
        let nt = NanoTime {
            year: 2016,
            day: 366,
            hour: 23,
            minute: 59,
            second: 60,
            nanosecond: 0,
        };
        assert_eq!(nt.to_datetime().unwrap(), datetime!(2017-01-01 00:00:00 UTC));
    }

    #[test]
    fn test_invalid_day_of_year() {
        let nt = NanoTime {
            day: 366,
            year: 2023,
            ..NanoTime::epoch()
        };
        assert!(matches!(nt.to_datetime(), Err(MseedError::InvalidTime(_))));
    }

    #[test]
    fn test_leap_second_at_last_instant_is_an_error() {
        let nt = NanoTime {
            year: 9999,
            day: 365,
            hour: 23,
            minute: 59,
            second: 60,
            nanosecond: 0,
        };
        assert!(matches!(nt.to_datetime(), Err(MseedError::InvalidTime(_))));
    }

    #[test]
    fn test_sample_time_near_the_last_instant() {
        let start = datetime!(9999-12-31 23:59:59 UTC);
        assert_eq!(checked_sample_time(start, 0, 1.0), Some(start));
        assert_eq!(checked_sample_time(start, 2, 1.0), None);
        assert_eq!(checked_sample_time(start, 2, 0.0), Some(start));
        assert!(sample_time(start, 2, 1.0) > start);
        assert!(matches!(
            checked_end_time(start, 3, 1.0),
            Err(MseedError::InvalidTime(_))
        ));
        assert_eq!(checked_end_time(start, 1, 1.0).unwrap(), start);
    }

    #[test]
    fn test_format_iso() {
        assert_eq!(
            format_iso(datetime!(2019-07-06 03:19:53.000001 UTC)),
            "2019-07-06T03:19:53.000001000Z"
        );
    }

    #[test]
    fn test_window_overlap() {
        let a = TimeWindow::new(datetime!(2020-01-01 00:00 UTC), datetime!(2020-01-01 00:10 UTC));
        let b = TimeWindow::after(datetime!(2020-01-01 00:10 UTC), Duration::minutes(5));
        let c = TimeWindow::before(datetime!(2019-12-31 23:59 UTC), Duration::minutes(1));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.union(&b).duration(), Duration::minutes(15));
        assert!(a.contains(datetime!(2020-01-01 00:10 UTC)));
    }

    #[test]
    fn test_reversed_window_is_normalized() {
        let w = TimeWindow::new(datetime!(2020-01-02 00:00 UTC), datetime!(2020-01-01 00:00 UTC));
        assert!(w.start < w.end);
    }

    #[test]
    fn test_seconds_rounds_to_nanos() {
        assert_eq!(seconds(0.05), Duration::milliseconds(50));
        assert_eq!(seconds(1.0 / 3.0), Duration::nanoseconds(333_333_333));
    }
}
