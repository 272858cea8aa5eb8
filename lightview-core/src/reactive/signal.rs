//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the signal registers
//!    that effect as a subscriber and the effect records the subscription so
//!    it can drop it before its next run.
//!
//! 2. When a signal is written with a value that is not strictly equal to the
//!    current one, every live subscriber re-runs synchronously, in
//!    subscription order, before `set` returns.
//!
//! 3. There is no batching: two writes cause two independent cascades.
//!
//! # Persistence
//!
//! A signal created with a name and a [`Storage`] backend loads the stored
//! JSON on construction (overriding the initial value) and writes JSON back
//! after every change.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use super::context::ReactiveContext;
use super::effect::Effect;
use super::storage::Storage;
use super::subscriber::Subscribers;
use crate::registry::ScopeId;
use crate::value::Value;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Options for creating a signal.
#[derive(Clone, Default)]
pub struct SignalOptions {
    /// Register the signal under this name. Also the storage key.
    pub name: Option<String>,
    /// Register in this scope instead of the global namespace.
    pub scope: Option<ScopeId>,
    /// Persist the value in this backend.
    pub storage: Option<Arc<dyn Storage>>,
}

impl SignalOptions {
    /// Options that only carry a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn in_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn persisted(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }
}

impl Debug for SignalOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalOptions")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("persisted", &self.storage.is_some())
            .finish()
    }
}

struct SignalInner {
    id: u64,
    value: RwLock<Value>,
    subscribers: Arc<Subscribers>,
    name: Option<String>,
    storage: Option<Arc<dyn Storage>>,
    /// The effect that writes this signal, kept alive with it.
    owner: Mutex<Option<Effect>>,
}

/// A reactive cell holding a [`Value`].
///
/// Cloning a signal yields another handle to the same cell.
///
/// ```rust
/// use lightview_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get().as_f64(), Some(5.0));
/// ```
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    /// Create a new signal with the given initial value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::build(value.into(), None, None)
    }

    /// Create a signal, loading a persisted value if one is stored.
    ///
    /// The scope in `options` is ignored here; registration under a name is
    /// the runtime's job.
    pub fn with_options(value: impl Into<Value>, options: &SignalOptions) -> Self {
        let mut value = value.into();
        let storage = match (&options.name, &options.storage) {
            (Some(name), Some(storage)) => {
                if let Some(stored) = load_stored(storage.as_ref(), name) {
                    value = stored;
                }
                Some(Arc::clone(storage))
            }
            (None, Some(_)) => {
                warn!("signal storage ignored: persisted signals need a name");
                None
            }
            _ => None,
        };
        Self::build(value, options.name.clone(), storage)
    }

    fn build(value: Value, name: Option<String>, storage: Option<Arc<dyn Storage>>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_signal_id(),
                value: RwLock::new(value),
                subscribers: Arc::new(Subscribers::default()),
                name,
                storage,
                owner: Mutex::new(None),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The name this signal was created with, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Get the current value.
    ///
    /// If called while an effect is running, this also subscribes that
    /// effect.
    pub fn get(&self) -> Value {
        self.track();
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Value {
        self.inner.value.read().clone()
    }

    /// Subscribe the running effect, once per run.
    pub(crate) fn track(&self) {
        if let Some(observer) = ReactiveContext::current_observer() {
            let subscribed = self
                .inner
                .subscribers
                .insert(observer.subscriber_id(), Arc::downgrade(&observer));
            if subscribed {
                observer.record(&self.inner.subscribers);
            }
        }
    }

    /// Set a new value and notify subscribers if it differs.
    ///
    /// Returns whether subscribers were notified.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        {
            let mut guard = self.inner.value.write();
            if guard.strict_eq(&value) {
                return false;
            }
            *guard = value;
        }

        self.persist();
        self.notify();
        true
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.get_untracked();
        self.set(f(&current))
    }

    /// Re-run every subscriber even though the value is unchanged.
    ///
    /// Used when a container held by the signal changed in place.
    pub(crate) fn notify(&self) {
        let subscribers = self.inner.subscribers.snapshot();
        trace!(signal = self.inner.id, count = subscribers.len(), "notifying subscribers");
        for effect in subscribers {
            effect.trigger();
        }
    }

    fn persist(&self) {
        let (Some(name), Some(storage)) = (&self.inner.name, &self.inner.storage) else {
            return;
        };
        let json = self.get_untracked().to_json();
        let result = serde_json::to_string(&json)
            .map_err(crate::Error::from)
            .and_then(|text| storage.set_item(name, &text));
        if let Err(e) = result {
            warn!(signal = %name, error = %e, "failed to persist signal");
        }
    }

    /// Get the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Keep `effect` alive for as long as this signal is.
    pub(crate) fn retain(&self, effect: Effect) {
        *self.inner.owner.lock() = Some(effect);
    }

    pub(crate) fn downgrade(&self) -> WeakSignal {
        WeakSignal {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A handle that does not keep the signal alive.
#[derive(Clone)]
pub(crate) struct WeakSignal {
    inner: Weak<SignalInner>,
}

impl WeakSignal {
    pub(crate) fn upgrade(&self) -> Option<Signal> {
        self.inner.upgrade().map(|inner| Signal { inner })
    }
}

/// Load and decode a stored JSON value, logging malformed entries.
pub(crate) fn load_stored(storage: &dyn Storage, key: &str) -> Option<Value> {
    let text = storage.get_item(key)?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Some(Value::from_json(&json)),
        Err(e) => {
            warn!(key = %key, error = %e, "ignoring malformed stored value");
            None
        }
    }
}

impl Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
