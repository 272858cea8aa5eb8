//! Mutable dates.
//!
//! A [`DateRef`] is a shared cell holding UTC epoch milliseconds. Setters
//! follow calendar-overflow rules: `set_date(32)` on a January date lands in
//! February, `set_month(12)` rolls into the next year. A date whose time is
//! `NaN` is invalid; its getters return `NaN` and its setters leave it so.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use parking_lot::RwLock;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Broken-down UTC date, month zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parts {
    year: i64,
    month: i64,
    day: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    millis: i64,
}

impl Parts {
    fn from_millis(ms: f64) -> Option<Self> {
        if !ms.is_finite() {
            return None;
        }
        let dt = DateTime::<Utc>::from_timestamp_millis(ms as i64)?;
        Some(Self {
            year: i64::from(dt.year()),
            month: i64::from(dt.month0()),
            day: i64::from(dt.day()),
            hours: i64::from(dt.hour()),
            minutes: i64::from(dt.minute()),
            seconds: i64::from(dt.second()),
            millis: i64::from(dt.timestamp_subsec_millis()),
        })
    }

    /// Compose back into epoch millis, letting every field overflow into
    /// the next larger unit.
    fn to_millis(self) -> f64 {
        let total_months = self.year * 12 + self.month;
        let year = total_months.div_euclid(12);
        let month = total_months.rem_euclid(12);
        let Ok(year) = i32::try_from(year) else {
            return f64::NAN;
        };
        let Some(first) = NaiveDate::from_ymd_opt(year, month as u32 + 1, 1) else {
            return f64::NAN;
        };
        let Some(midnight) = first.and_hms_opt(0, 0, 0) else {
            return f64::NAN;
        };
        let base = midnight.and_utc().timestamp_millis();
        let offset = (self.day - 1) * MS_PER_DAY
            + self.hours * MS_PER_HOUR
            + self.minutes * MS_PER_MINUTE
            + self.seconds * MS_PER_SECOND
            + self.millis;
        (base + offset) as f64
    }
}

/// A shared, mutable point in time.
#[derive(Clone)]
pub struct DateRef(Arc<RwLock<f64>>);

impl DateRef {
    /// Create a date from epoch milliseconds.
    pub fn from_millis(ms: f64) -> Self {
        Self(Arc::new(RwLock::new(ms)))
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis() as f64)
    }

    /// Create a date from UTC calendar fields. `month` is zero-based.
    pub fn from_ymd_hms(year: i32, month: u32, day: u32, hours: u32, minutes: u32, seconds: u32) -> Self {
        let parts = Parts {
            year: i64::from(year),
            month: i64::from(month),
            day: i64::from(day),
            hours: i64::from(hours),
            minutes: i64::from(minutes),
            seconds: i64::from(seconds),
            millis: 0,
        };
        Self::from_millis(parts.to_millis())
    }

    pub fn get_time(&self) -> f64 {
        *self.0.read()
    }

    pub fn set_time(&self, ms: f64) -> f64 {
        *self.0.write() = ms;
        ms
    }

    pub fn is_valid(&self) -> bool {
        self.get_time().is_finite()
    }

    fn read_part(&self, f: impl FnOnce(&Parts) -> i64) -> f64 {
        Parts::from_millis(self.get_time()).map_or(f64::NAN, |p| f(&p) as f64)
    }

    fn write_part(&self, f: impl FnOnce(&mut Parts)) -> f64 {
        let mut guard = self.0.write();
        let Some(mut parts) = Parts::from_millis(*guard) else {
            return f64::NAN;
        };
        f(&mut parts);
        *guard = parts.to_millis();
        *guard
    }

    pub fn get_full_year(&self) -> f64 {
        self.read_part(|p| p.year)
    }

    /// Zero-based month.
    pub fn get_month(&self) -> f64 {
        self.read_part(|p| p.month)
    }

    /// Day of the month, starting at 1.
    pub fn get_date(&self) -> f64 {
        self.read_part(|p| p.day)
    }

    /// Day of the week, Sunday is 0.
    pub fn get_day(&self) -> f64 {
        let ms = self.get_time();
        if !ms.is_finite() {
            return f64::NAN;
        }
        DateTime::<Utc>::from_timestamp_millis(ms as i64)
            .map_or(f64::NAN, |dt| f64::from(dt.weekday().num_days_from_sunday()))
    }

    pub fn get_hours(&self) -> f64 {
        self.read_part(|p| p.hours)
    }

    pub fn get_minutes(&self) -> f64 {
        self.read_part(|p| p.minutes)
    }

    pub fn get_seconds(&self) -> f64 {
        self.read_part(|p| p.seconds)
    }

    pub fn get_milliseconds(&self) -> f64 {
        self.read_part(|p| p.millis)
    }

    pub fn set_full_year(&self, year: i64) -> f64 {
        self.write_part(|p| p.year = year)
    }

    pub fn set_month(&self, month: i64) -> f64 {
        self.write_part(|p| p.month = month)
    }

    pub fn set_date(&self, day: i64) -> f64 {
        self.write_part(|p| p.day = day)
    }

    pub fn set_hours(&self, hours: i64) -> f64 {
        self.write_part(|p| p.hours = hours)
    }

    pub fn set_minutes(&self, minutes: i64) -> f64 {
        self.write_part(|p| p.minutes = minutes)
    }

    pub fn set_seconds(&self, seconds: i64) -> f64 {
        self.write_part(|p| p.seconds = seconds)
    }

    pub fn set_milliseconds(&self, millis: i64) -> f64 {
        self.write_part(|p| p.millis = millis)
    }

    /// ISO-8601 with millisecond precision, or `None` for an invalid date.
    pub fn to_iso_string(&self) -> Option<String> {
        let ms = self.get_time();
        if !ms.is_finite() {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis(ms as i64)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<RwLock<f64>> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<RwLock<f64>>) -> Option<Self> {
        weak.upgrade().map(Self)
    }
}

impl fmt::Debug for DateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_iso_string() {
            Some(iso) => write!(f, "DateRef({iso})"),
            None => write!(f, "DateRef(Invalid Date)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_round_trip() {
        let date = DateRef::from_ymd_hms(2024, 0, 31, 10, 30, 0);
        assert_eq!(date.get_full_year(), 2024.0);
        assert_eq!(date.get_month(), 0.0);
        assert_eq!(date.get_date(), 31.0);
        assert_eq!(date.get_hours(), 10.0);
        assert_eq!(date.to_iso_string().as_deref(), Some("2024-01-31T10:30:00.000Z"));
    }

    #[test]
    fn set_date_overflows_into_next_month() {
        let date = DateRef::from_ymd_hms(2024, 0, 15, 0, 0, 0);
        date.set_date(32);
        assert_eq!(date.get_month(), 1.0);
        assert_eq!(date.get_date(), 1.0);
    }

    #[test]
    fn set_month_rolls_the_year() {
        let date = DateRef::from_ymd_hms(2023, 5, 1, 0, 0, 0);
        date.set_month(12);
        assert_eq!(date.get_full_year(), 2024.0);
        assert_eq!(date.get_month(), 0.0);
    }

    #[test]
    fn negative_hours_borrow_from_the_previous_day() {
        let date = DateRef::from_ymd_hms(2024, 2, 1, 5, 0, 0);
        date.set_hours(-1);
        assert_eq!(date.get_month(), 1.0);
        assert_eq!(date.get_date(), 29.0);
        assert_eq!(date.get_hours(), 23.0);
    }

    #[test]
    fn invalid_dates_stay_invalid() {
        let date = DateRef::from_millis(f64::NAN);
        assert!(!date.is_valid());
        assert!(date.get_full_year().is_nan());
        assert!(date.set_date(3).is_nan());
        assert!(date.to_iso_string().is_none());
    }

    #[test]
    fn epoch_is_a_thursday() {
        assert_eq!(DateRef::from_millis(0.0).get_day(), 4.0);
    }
}
