//! Monitored date methods.
//!
//! A date state's monitor holds its epoch milliseconds. Getters read the
//! monitor; setters write the raw date and then update the monitor, which
//! only wakes readers if the instant actually moved.

use crate::error::{Error, Result};
use crate::value::DateRef;

use super::{Raw, State};

impl State {
    fn date(&self, operation: &'static str) -> Result<&DateRef> {
        match &self.inner.raw {
            Raw::Date(date) => Ok(date),
            other => Err(Error::Unsupported {
                operation,
                kind: other.kind().type_name(),
            }),
        }
    }

    /// Read the wrapped date, subscribing to any change of its instant.
    pub fn read_date<R>(&self, f: impl FnOnce(&DateRef) -> R) -> Result<R> {
        let date = self.date("read_date")?;
        self.inner.slot.monitor.track();
        Ok(f(date))
    }

    /// Mutate the wrapped date and notify readers if the instant moved.
    pub fn update_date<R>(&self, f: impl FnOnce(&DateRef) -> R) -> Result<R> {
        let date = self.date("update_date")?;
        let result = f(date);

        let time = date.get_time();
        let monitor = &self.inner.slot.monitor;
        let previous = monitor.get_untracked().to_number();
        let unchanged = previous == time || (previous.is_nan() && time.is_nan());
        if !unchanged {
            monitor.set(time);
            self.persist();
        }
        Ok(result)
    }

    pub fn get_time(&self) -> Result<f64> {
        self.read_date(DateRef::get_time)
    }

    pub fn set_time(&self, ms: f64) -> Result<f64> {
        self.update_date(|d| d.set_time(ms))
    }

    pub fn set_full_year(&self, year: i64) -> Result<f64> {
        self.update_date(|d| d.set_full_year(year))
    }

    pub fn set_month(&self, month: i64) -> Result<f64> {
        self.update_date(|d| d.set_month(month))
    }

    pub fn set_date(&self, day: i64) -> Result<f64> {
        self.update_date(|d| d.set_date(day))
    }

    pub fn set_hours(&self, hours: i64) -> Result<f64> {
        self.update_date(|d| d.set_hours(hours))
    }

    pub fn set_minutes(&self, minutes: i64) -> Result<f64> {
        self.update_date(|d| d.set_minutes(minutes))
    }

    pub fn set_seconds(&self, seconds: i64) -> Result<f64> {
        self.update_date(|d| d.set_seconds(seconds))
    }

    pub fn set_milliseconds(&self, millis: i64) -> Result<f64> {
        self.update_date(|d| d.set_milliseconds(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::env;
    use super::*;
    use crate::reactive::Effect;
    use crate::value::Value;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn date_state() -> State {
        let env = env();
        match env.wrap_value(Value::Date(DateRef::from_ymd_hms(2024, 0, 15, 12, 0, 0))) {
            Value::State(state) => state,
            other => panic!("expected a state, got {other:?}"),
        }
    }

    #[test]
    fn setters_wake_readers() {
        let date = date_state();
        let day = Arc::new(AtomicI32::new(0));

        let day_clone = day.clone();
        let date_clone = date.clone();
        let _effect = Effect::new(move || {
            let d = date_clone.read_date(DateRef::get_date).unwrap();
            day_clone.store(d as i32, Ordering::SeqCst);
        });
        assert_eq!(day.load(Ordering::SeqCst), 15);

        date.set_date(20).unwrap();
        assert_eq!(day.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn setting_the_same_instant_is_silent() {
        let date = date_state();
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let date_clone = date.clone();
        let _effect = Effect::new(move || {
            date_clone.get_time().unwrap();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        date.set_hours(12).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        date.set_hours(13).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn date_methods_reject_arrays() {
        let env = env();
        let Value::State(arr) = env.wrap_value(Value::array([1])) else {
            panic!("expected a state");
        };
        assert!(matches!(arr.set_date(1), Err(Error::Unsupported { kind: "array", .. })));
    }
}
