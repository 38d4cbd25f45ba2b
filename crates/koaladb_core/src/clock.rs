//! Time source and timestamp helpers.
//!
//! Document timestamps are UTC epoch seconds stored as `f64`. All
//! mutating operations read the current time through a [`Clock`] so tests
//! can pin it.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds in one hour.
pub const SECS_PER_HOUR: f64 = 3_600.0;

/// Seconds in one day.
pub const SECS_PER_DAY: f64 = 86_400.0;

/// A source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current UTC time as epoch seconds.
    fn now(&self) -> f64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    /// Creates a clock fixed at `now`.
    #[must_use]
    pub fn new(now: f64) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// Converts epoch seconds to a UTC date-time.
///
/// Returns `None` for non-finite or out-of-range timestamps.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_datetime(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
}

/// Converts a UTC date-time to epoch seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn from_datetime(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

/// Formats a timestamp with a `strftime`-style pattern.
///
/// Returns `None` for an out-of-range timestamp or a pattern with an
/// unknown specifier.
#[must_use]
pub fn format_timestamp(timestamp: f64, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    to_datetime(timestamp).map(|dt| dt.format_with_items(items.iter()).to_string())
}

/// The UTC calendar day containing `timestamp`.
#[must_use]
pub fn date_of(timestamp: f64) -> Option<NaiveDate> {
    to_datetime(timestamp).map(|dt| dt.date_naive())
}

/// Epoch seconds of midnight UTC at the start of `date`.
#[must_use]
pub fn start_of_date(date: NaiveDate) -> f64 {
    from_datetime(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Midnight UTC of the day containing `timestamp`.
#[must_use]
pub fn start_of_day(timestamp: f64) -> Option<f64> {
    date_of(timestamp).map(start_of_date)
}

/// Midnight UTC of the Monday starting the week containing `timestamp`.
#[must_use]
pub fn start_of_week(timestamp: f64) -> Option<f64> {
    let date = date_of(timestamp)?;
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    Some(start_of_date(monday))
}

/// Midnight UTC on the first day of the month containing `timestamp`.
#[must_use]
pub fn start_of_month(timestamp: f64) -> Option<f64> {
    let date = date_of(timestamp)?;
    date.with_day(1).map(start_of_date)
}
