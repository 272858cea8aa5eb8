//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, effects and
//! computed values. These primitives form the foundation of Lightview's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect is running, the signal automatically registers that effect
//! as a dependent. When the signal's value changes, all dependents re-run.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Dependencies are rediscovered on every run.
//!
//! ## Computed
//!
//! A Computed is a signal maintained by an effect: derived state.
//!
//! # Implementation Notes
//!
//! Everything is synchronous. A write re-runs its subscribers before it
//! returns; there is no scheduler, no batching and no deferral. The tracking
//! context is a thread-local stack, so each thread has its own notion of the
//! "currently running effect".

mod computed;
mod context;
mod effect;
mod signal;
mod storage;
mod subscriber;

pub use computed::Computed;
pub use context::{untracked, ReactiveContext};
pub use effect::{Effect, DEFAULT_RERUN_LIMIT};
pub use signal::{Signal, SignalOptions};
pub use storage::{MemoryStorage, Storage};
pub use subscriber::SubscriberId;

pub(crate) use signal::{load_stored, WeakSignal};
