//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. Before every run, the effect unsubscribes from everything it read last
//!    time. A signal read only behind a branch that is no longer taken stops
//!    triggering the effect.
//!
//! 3. A trigger that arrives while the effect is already running (its body
//!    wrote to a signal it reads) is not executed re-entrantly. It is queued,
//!    and the effect runs again right after the current pass, up to a re-run
//!    limit. When the limit is hit the remaining trigger is dropped with a
//!    warning.
//!
//! # Lifetime
//!
//! Signals hold their subscribers weakly. An effect lives as long as some
//! [`Effect`] handle does; `stop()` ends it early. Once stopped, triggers are
//! no-ops.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::context::ReactiveContext;
use super::subscriber::{SubscriberId, Subscribers};

/// Default cap on queued self-triggered re-runs.
pub const DEFAULT_RERUN_LIMIT: usize = 100;

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct EffectInner {
    id: u64,
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    /// Subscriber sets this effect is currently registered in.
    dependencies: Mutex<SmallVec<[Weak<Subscribers>; 4]>>,
    active: AtomicBool,
    running: AtomicBool,
    pending: AtomicBool,
    run_count: AtomicUsize,
    rerun_limit: usize,
}

/// Clears the running flag even if the effect body panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EffectInner {
    pub(crate) fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    /// Remember a subscription so the next run can drop it.
    pub(crate) fn record(&self, subscribers: &Arc<Subscribers>) {
        self.dependencies.lock().push(Arc::downgrade(subscribers));
    }

    fn clear_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for weak in dependencies {
            if let Some(subscribers) = weak.upgrade() {
                subscribers.remove(self.subscriber_id);
            }
        }
    }

    /// Called by a signal this effect subscribed to.
    pub(crate) fn trigger(self: &Arc<Self>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if self.running.load(Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return;
        }
        self.execute();
    }

    fn execute(self: &Arc<Self>) {
        if !self.active.load(Ordering::SeqCst) || self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let _running = RunningGuard(&self.running);

        let mut reruns = 0;
        loop {
            self.pending.store(false, Ordering::SeqCst);
            self.clear_dependencies();
            {
                let _ctx = ReactiveContext::enter(self.subscriber_id, Arc::downgrade(self));
                (self.run)();
            }
            self.run_count.fetch_add(1, Ordering::Relaxed);
            trace!(effect = self.id, "effect ran");

            if !self.pending.load(Ordering::SeqCst) || !self.active.load(Ordering::SeqCst) {
                break;
            }
            reruns += 1;
            if reruns > self.rerun_limit {
                warn!(
                    effect = self.id,
                    limit = self.rerun_limit,
                    "effect keeps re-triggering itself; dropping the pending run"
                );
                self.pending.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.pending.store(false, Ordering::SeqCst);
        self.clear_dependencies();
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use lightview_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Signal::new(-1);
///
/// let (c, s) = (count.clone(), seen.clone());
/// let _effect = Effect::new(move || {
///     s.set(c.get());
/// });
///
/// count.set(5);
/// assert_eq!(seen.get_untracked().as_f64(), Some(5.0));
/// ```
#[must_use = "an effect stops running once every handle to it is dropped"]
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it once to discover its dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_rerun_limit(DEFAULT_RERUN_LIMIT, run)
    }

    /// Like [`Effect::new`] with an explicit cap on self-triggered re-runs.
    pub fn with_rerun_limit<F>(rerun_limit: usize, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(rerun_limit, run);
        effect.inner.execute();
        effect
    }

    /// Create an effect without running it. It subscribes to nothing until
    /// [`Effect::run`] is called.
    pub fn new_lazy<F>(rerun_limit: usize, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: next_effect_id(),
                subscriber_id: SubscriberId::new(),
                run: Box::new(run),
                dependencies: Mutex::new(SmallVec::new()),
                active: AtomicBool::new(true),
                running: AtomicBool::new(false),
                pending: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
                rerun_limit,
            }),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID used for dependency tracking.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Re-run the effect now, as if a dependency had changed.
    pub fn run(&self) {
        self.inner.trigger();
    }

    /// Unsubscribe from everything and never run again.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Number of signals the effect read during its last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
