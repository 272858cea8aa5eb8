//! Deep-Reactive State
//!
//! A [`State`] wraps a plain object, array or date so that reading a
//! property subscribes the running effect to exactly that property, and
//! writing it wakes exactly the effects that read it.
//!
//! # How it works
//!
//! Every wrapped container has a *slot* in a side table keyed by the
//! container's identity. The slot holds:
//!
//! - one backing [`Signal`] per property that has been read, created lazily
//!   and seeded from the raw value;
//! - a *monitor* signal that stands for the container's shape: an array's
//!   length, a date's epoch milliseconds, an object's key count;
//! - a *version* signal bumped whenever the contents change structurally,
//!   read by the tracking collection methods;
//! - the parent link, schema, persistence target and scope.
//!
//! The slot lives as long as the raw container does, so backing signals
//! (and their subscribers) survive even when every `State` handle over the
//! container has been dropped. The `State` handles themselves are cached
//! weakly: wrapping the same container twice while a handle is alive yields
//! the same handle.
//!
//! Writes update the raw container first and the backing signal second, so
//! an effect woken by the write sees the same value a raw read would.
//!
//! Maps, sets, regular expressions and other opaque values are never
//! wrapped.

mod array;
mod date;
mod raw;
mod schema;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::expr::HelperTable;
use crate::reactive::{Signal, Storage};
use crate::registry::ScopeId;
use crate::value::{ObjectRef, Value};

pub(crate) use array::index_key as array_index;
pub(crate) use raw::{Raw, RawWeak};
pub use schema::{Schema, SchemaBehavior, Transform};

/// Hook consulted on every property write. Returning `Err` vetoes the
/// write with [`Error::Validation`].
pub type Validator = Arc<dyn Fn(&str, &Value) -> std::result::Result<(), String> + Send + Sync>;

/// The kind of container a state wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Object,
    Array,
    Date,
}

impl StateKind {
    pub fn type_name(self) -> &'static str {
        match self {
            StateKind::Object => "object",
            StateKind::Array => "array",
            StateKind::Date => "date",
        }
    }
}

/// Where a persisted state tree writes itself.
struct Persist {
    storage: Arc<dyn Storage>,
    key: String,
    root: RawWeak,
}

impl Persist {
    fn save(&self) {
        let Some(root) = self.root.upgrade() else {
            return;
        };
        let result = serde_json::to_string(&root.to_value().to_json())
            .map_err(Error::from)
            .and_then(|text| self.storage.set_item(&self.key, &text));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "failed to persist state");
        }
    }
}

/// Per-container reactive bookkeeping.
pub(crate) struct Slot {
    signals: Mutex<IndexMap<String, Signal>>,
    monitor: Signal,
    version: Signal,
    parent: RwLock<Option<RawWeak>>,
    schema: RwLock<Option<Arc<Schema>>>,
    persist: RwLock<Option<Arc<Persist>>>,
    scope: RwLock<Option<ScopeId>>,
}

impl Slot {
    fn new(raw: &Raw) -> Self {
        let monitor = match raw {
            Raw::Object(obj) => Value::from(obj.len()),
            Raw::Array(arr) => Value::from(arr.len()),
            Raw::Date(date) => Value::from(date.get_time()),
        };
        Self {
            signals: Mutex::new(IndexMap::new()),
            monitor: Signal::new(monitor),
            version: Signal::new(0),
            parent: RwLock::new(None),
            schema: RwLock::new(None),
            persist: RwLock::new(None),
            scope: RwLock::new(None),
        }
    }

    /// The backing signal for `key`, created from `seed` on first use.
    fn signal_for(&self, key: &str, seed: impl FnOnce() -> Value) -> Signal {
        let mut signals = self.signals.lock();
        if let Some(signal) = signals.get(key) {
            return signal.clone();
        }
        let signal = Signal::new(seed());
        signals.insert(key.to_string(), signal.clone());
        signal
    }

    fn existing_signal(&self, key: &str) -> Option<Signal> {
        self.signals.lock().get(key).cloned()
    }

    fn materialized(&self) -> Vec<(String, Signal)> {
        self.signals
            .lock()
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect()
    }

    fn bump_version(&self) {
        self.version
            .update(|v| Value::Number(v.to_number() + 1.0));
    }
}

struct Entry {
    raw: RawWeak,
    slot: Arc<Slot>,
    proxy: Weak<StateInner>,
}

const MIN_PRUNE_AT: usize = 64;

struct ProxyTable {
    entries: HashMap<usize, Entry>,
    prune_at: usize,
}

impl ProxyTable {
    fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.raw.is_alive());
        self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_AT);
    }
}

/// The proxy cache, backing-signal side table and write hooks shared by
/// every state created through one runtime.
pub(crate) struct StateEnv {
    table: Mutex<ProxyTable>,
    validator: RwLock<Option<Validator>>,
    helpers: Arc<HelperTable>,
}

impl StateEnv {
    pub(crate) fn new(helpers: Arc<HelperTable>) -> Self {
        Self {
            table: Mutex::new(ProxyTable {
                entries: HashMap::new(),
                prune_at: MIN_PRUNE_AT,
            }),
            validator: RwLock::new(None),
            helpers,
        }
    }

    /// Wrap a raw container, reusing the live handle if there is one.
    pub(crate) fn wrap_raw(self: &Arc<Self>, raw: Raw) -> State {
        let mut table = self.table.lock();
        let addr = raw.addr();

        if let Some(entry) = table.entries.get_mut(&addr) {
            if entry.raw.is_alive() {
                if let Some(inner) = entry.proxy.upgrade() {
                    return State { inner };
                }
                let inner = Arc::new(StateInner {
                    raw,
                    slot: Arc::clone(&entry.slot),
                    env: Arc::clone(self),
                });
                entry.proxy = Arc::downgrade(&inner);
                return State { inner };
            }
        }

        if table.entries.len() >= table.prune_at {
            table.prune();
        }

        trace!(addr, kind = raw.kind().type_name(), "wrapping container");
        let slot = Arc::new(Slot::new(&raw));
        let inner = Arc::new(StateInner {
            raw: raw.clone(),
            slot: Arc::clone(&slot),
            env: Arc::clone(self),
        });
        table.entries.insert(
            addr,
            Entry {
                raw: raw.downgrade(),
                slot,
                proxy: Arc::downgrade(&inner),
            },
        );
        State { inner }
    }

    /// Wrap objects, arrays and dates; return anything else unchanged.
    pub(crate) fn wrap_value(self: &Arc<Self>, value: Value) -> Value {
        match Raw::from_value(&value) {
            Some(raw) => Value::State(self.wrap_raw(raw)),
            None => value,
        }
    }

    pub(crate) fn set_validator(&self, validator: Option<Validator>) {
        *self.validator.write() = validator;
    }

    /// Number of containers with a live slot.
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        let mut table = self.table.lock();
        table.prune();
        table.entries.len()
    }

    /// Forget every slot and the validation hook.
    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut self.table.lock().entries);
        drop(entries);
        self.set_validator(None);
    }
}

pub(crate) struct StateInner {
    raw: Raw,
    slot: Arc<Slot>,
    env: Arc<StateEnv>,
}

/// A deep-reactive view over an object, array or date.
///
/// Cloning a `State` clones the handle, not the data.
#[derive(Clone)]
pub struct State {
    inner: Arc<StateInner>,
}

impl State {
    /// Identity comparison.
    pub fn ptr_eq(a: &State, b: &State) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn kind(&self) -> StateKind {
        self.inner.raw.kind()
    }

    /// The wrapped container.
    pub fn raw(&self) -> Value {
        self.inner.raw.to_value()
    }

    /// Read a property, subscribing the running effect to it.
    ///
    /// Nested containers come back wrapped, with this state as their
    /// parent. On arrays, `"length"` reads the monitor.
    pub fn get(&self, key: &str) -> Value {
        let slot = &self.inner.slot;
        match &self.inner.raw {
            Raw::Object(obj) => {
                let signal = slot.signal_for(key, || obj.get(key).unwrap_or_default());
                self.wrap_child(signal.get())
            }
            Raw::Array(arr) => {
                if key == "length" {
                    return slot.monitor.get();
                }
                match array::index_key(key) {
                    Some(index) => {
                        let signal = slot.signal_for(key, || arr.get(index).unwrap_or_default());
                        self.wrap_child(signal.get())
                    }
                    None => Value::Undefined,
                }
            }
            Raw::Date(_) => {
                slot.monitor.track();
                Value::Undefined
            }
        }
    }

    /// Read an array element.
    pub fn at(&self, index: usize) -> Value {
        self.get(&index.to_string())
    }

    /// Write a property through the schema and validation hook.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into().to_raw();
        match &self.inner.raw {
            Raw::Object(obj) => self.set_property(obj, key, value),
            Raw::Array(arr) => self.set_index(arr, key, value),
            Raw::Date(_) => Err(Error::Unsupported {
                operation: "set",
                kind: "date",
            }),
        }
    }

    fn set_property(&self, obj: &ObjectRef, key: &str, value: Value) -> Result<()> {
        let existing = obj.get(key);
        let value = match self.schema() {
            Some(schema) => schema.check(key, value, existing.as_ref(), &self.inner.env.helpers)?,
            None => value,
        };
        self.validate(key, &value)?;

        obj.insert(key, value.clone());
        let slot = &self.inner.slot;
        if let Some(signal) = slot.existing_signal(key) {
            signal.set(value);
        }
        if existing.is_none() {
            slot.monitor.set(obj.len());
            slot.bump_version();
        }
        self.persist();
        Ok(())
    }

    fn validate(&self, key: &str, value: &Value) -> Result<()> {
        let validator = self.inner.env.validator.read().clone();
        match validator {
            Some(validator) => validator(key, value).map_err(|message| Error::Validation {
                key: key.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }

    /// Whether `key` is present. Tracks the key set.
    pub fn has(&self, key: &str) -> bool {
        self.inner.slot.version.track();
        match &self.inner.raw {
            Raw::Object(obj) => obj.contains_key(key),
            Raw::Array(arr) => key == "length" || array::index_key(key).is_some_and(|i| i < arr.len()),
            Raw::Date(_) => false,
        }
    }

    /// Remove a property. Returns whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let Raw::Object(obj) = &self.inner.raw else {
            return Err(Error::Unsupported {
                operation: "delete",
                kind: self.kind().type_name(),
            });
        };
        if obj.remove(key).is_none() {
            return Ok(false);
        }
        let slot = &self.inner.slot;
        if let Some(signal) = slot.existing_signal(key) {
            signal.set(Value::Undefined);
        }
        slot.monitor.set(obj.len());
        slot.bump_version();
        self.persist();
        Ok(true)
    }

    /// Property names (array indices for arrays). Tracks the key set.
    pub fn keys(&self) -> Vec<String> {
        self.inner.slot.version.track();
        match &self.inner.raw {
            Raw::Object(obj) => obj.keys(),
            Raw::Array(arr) => (0..arr.len()).map(|i| i.to_string()).collect(),
            Raw::Date(_) => Vec::new(),
        }
    }

    /// The state that most recently exposed this one by navigation.
    pub fn parent(&self) -> Option<State> {
        let parent = self.inner.slot.parent.read().clone()?;
        let raw = parent.upgrade()?;
        Some(self.inner.env.wrap_raw(raw))
    }

    /// The scope `$/` lookups starting from this state use.
    pub fn scope(&self) -> Option<ScopeId> {
        *self.inner.slot.scope.read()
    }

    pub fn set_scope(&self, scope: Option<ScopeId>) {
        *self.inner.slot.scope.write() = scope;
    }

    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.inner.slot.schema.read().clone()
    }

    /// Attach or remove a schema. Schemas apply to object states only and
    /// are not inherited by nested containers.
    pub fn set_schema(&self, schema: Option<Schema>) {
        *self.inner.slot.schema.write() = schema.map(Arc::new);
    }

    /// Persist this tree under `key` after every write.
    pub(crate) fn persist_to(&self, storage: Arc<dyn Storage>, key: impl Into<String>) {
        *self.inner.slot.persist.write() = Some(Arc::new(Persist {
            storage,
            key: key.into(),
            root: self.inner.raw.downgrade(),
        }));
    }

    /// Snapshot as JSON without tracking.
    pub fn to_json(&self) -> serde_json::Value {
        self.raw().to_json()
    }

    fn persist(&self) {
        let persist = self.inner.slot.persist.read().clone();
        if let Some(persist) = persist {
            persist.save();
        }
    }

    /// Wrap a container read out of this state and link it back here.
    fn wrap_child(&self, value: Value) -> Value {
        let Some(raw) = Raw::from_value(&value) else {
            return value;
        };
        let child = self.inner.env.wrap_raw(raw);
        child.adopt(self);
        Value::State(child)
    }

    fn adopt(&self, parent: &State) {
        let slot = &self.inner.slot;
        let from = &parent.inner.slot;
        *slot.parent.write() = Some(parent.inner.raw.downgrade());

        if slot.persist.read().is_none() {
            let inherited = from.persist.read().clone();
            *slot.persist.write() = inherited;
        }
        if slot.scope.read().is_none() {
            let inherited = *from.scope.read();
            *slot.scope.write() = inherited;
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("kind", &self.kind())
            .field("addr", &format_args!("{:#x}", self.inner.raw.addr()))
            .finish()
    }
}
