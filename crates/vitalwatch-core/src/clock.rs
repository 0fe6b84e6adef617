//! Wall-clock helpers for the telemetry cadence.
//!
//! Vitals are reported on 5-minute marks. Records carry a timestamp rounded
//! up to the next mark so that readings from many devices line up on the
//! collector side.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Timelike};

/// Reporting grid, in minutes.
pub const ROUNDING_MINUTES: u32 = 5;

/// Round up to the next multiple of [`ROUNDING_MINUTES`] (a time already on
/// a mark keeps its minute), with seconds and sub-seconds zeroed. Minute 58
/// carries into minute 0 of the next hour.
pub fn rounded_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let minute = now.minute();
    let rounded = minute.div_ceil(ROUNDING_MINUTES) * ROUNDING_MINUTES;
    let delta = TimeDelta::minutes(i64::from(rounded) - i64::from(minute))
        - TimeDelta::seconds(i64::from(now.second()))
        - TimeDelta::nanoseconds(i64::from(now.nanosecond()));
    now.clone() + delta
}

/// Time left until the next wall-clock boundary that is a whole multiple of
/// `interval` counted from local midnight. A time exactly on a boundary
/// waits a full interval.
pub fn delay_until_next_boundary<Tz: TimeZone>(now: &DateTime<Tz>, interval: Duration) -> Duration {
    let interval_nanos = interval.as_nanos().max(1);
    let since_midnight = u128::from(now.num_seconds_from_midnight()) * 1_000_000_000
        + u128::from(now.nanosecond().min(999_999_999));
    let into = since_midnight % interval_nanos;
    let remaining = interval_nanos - into;
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}

/// `yyyy-MM-dd HH:mm:ss` in the timestamp's own zone.
pub fn format_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
