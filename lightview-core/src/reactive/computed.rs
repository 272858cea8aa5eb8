//! Computed Implementation
//!
//! A Computed is a signal whose value is written only by its own effect.
//! The effect runs the derivation eagerly, on creation and whenever one of
//! the signals it read changes, and stores the result in the signal. Readers
//! subscribe to that signal like to any other.
//!
//! Unlike a bare signal, a computed has a lifecycle: [`Computed::stop`] ends
//! the derivation and leaves the last value in place.
//!
//! The signal owns the effect and the effect only holds the signal weakly,
//! so the derivation lives exactly as long as some handle to the signal.
//! That includes a computed converted into a [`Value`].

use std::fmt::Debug;

use super::effect::{Effect, DEFAULT_RERUN_LIMIT};
use super::signal::Signal;
use crate::value::Value;

/// A derived value kept in sync with the signals it reads.
///
/// ```rust
/// use lightview_core::reactive::{Computed, Signal};
///
/// let base = Signal::new(2);
/// let b = base.clone();
/// let doubled = Computed::new(move || b.get().to_number() * 2.0);
///
/// base.set(21);
/// assert_eq!(doubled.get().as_f64(), Some(42.0));
/// ```
#[must_use = "a computed stops updating once every handle to it is dropped"]
#[derive(Clone)]
pub struct Computed {
    signal: Signal,
    effect: Effect,
}

impl Computed {
    /// Create a computed value. The derivation runs immediately.
    pub fn new<F, T>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::with_rerun_limit(DEFAULT_RERUN_LIMIT, compute)
    }

    /// Like [`Computed::new`] with an explicit re-run cap for the inner effect.
    pub fn with_rerun_limit<F, T>(rerun_limit: usize, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        let signal = Signal::new(Value::Undefined);
        let target = signal.downgrade();
        let effect = Effect::with_rerun_limit(rerun_limit, move || {
            if let Some(target) = target.upgrade() {
                target.set(compute());
            }
        });
        signal.retain(effect.clone());
        Self { signal, effect }
    }

    /// Read the current value, subscribing the running effect.
    pub fn get(&self) -> Value {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> Value {
        self.signal.get_untracked()
    }

    /// The signal holding the derived value.
    ///
    /// Writing to it directly is allowed but will be overwritten on the next
    /// recomputation.
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// The effect driving the derivation.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Stop recomputing. The last value stays readable.
    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

impl Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("signal", &self.signal)
            .field("active", &self.is_active())
            .finish()
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Value::Signal(computed.signal)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn computed_tracks_its_inputs() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let (a2, b2) = (a.clone(), b.clone());
        let sum = Computed::new(move || a2.get().to_number() + b2.get().to_number());

        assert_eq!(sum.get().as_f64(), Some(3.0));
        a.set(10);
        assert_eq!(sum.get().as_f64(), Some(12.0));
        b.set(20);
        assert_eq!(sum.get().as_f64(), Some(30.0));
    }

    #[test]
    fn computed_chains_propagate() {
        let base = Signal::new(5);
        let b = base.clone();
        let doubled = Computed::new(move || b.get().to_number() * 2.0);
        let d = doubled.clone();
        let plus_ten = Computed::new(move || d.get().to_number() + 10.0);

        assert_eq!(plus_ten.get().as_f64(), Some(20.0));
        base.set(10);
        assert_eq!(doubled.get().as_f64(), Some(20.0));
        assert_eq!(plus_ten.get().as_f64(), Some(30.0));
    }

    #[test]
    fn unchanged_result_does_not_wake_readers() {
        let input = Signal::new(1);
        let i = input.clone();
        let parity = Computed::new(move || i.get().to_number() % 2.0);

        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let p = parity.clone();
        let _reader = Effect::new(move || {
            p.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        input.set(3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        input.set(4);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn converted_computed_keeps_deriving() {
        let base = Signal::new(1);
        let b = base.clone();
        let value: Value = Computed::new(move || b.get().to_number() * 10.0).into();

        base.set(2);
        assert_eq!(value.unwrap_cell().as_f64(), Some(20.0));
    }

    #[test]
    fn dropping_every_handle_ends_the_derivation() {
        let base = Signal::new(1);
        let runs = Arc::new(AtomicI32::new(0));
        let (b, runs_clone) = (base.clone(), runs.clone());
        let computed = Computed::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            b.get()
        });
        drop(computed);

        base.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(base.subscriber_count(), 0);
    }

    #[test]
    fn stopped_computed_keeps_last_value() {
        let input = Signal::new(1);
        let i = input.clone();
        let copy = Computed::new(move || i.get());

        copy.stop();
        input.set(2);
        assert!(!copy.is_active());
        assert_eq!(copy.get().as_f64(), Some(1.0));
    }
}
