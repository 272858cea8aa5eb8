//! Named Cells
//!
//! The registry maps names to signals and states, globally and per scope.
//!
//! # Scopes
//!
//! A scope is an opaque [`ScopeId`] the host hands out for whatever it uses
//! as a naming boundary (a DOM node, a component instance). Scopes form a
//! tree through [`Registry::set_scope_parent`]; a lookup walks from the
//! given scope to the root and then falls back to the global namespace.
//!
//! # Binding rules
//!
//! A name, once bound in a namespace, stays bound to the same cell. Binding
//! the same cell again is a no-op; binding a different cell is a
//! [`Error::NameCollision`].
//!
//! # Futures
//!
//! Asking for a name that does not exist yet returns a *future*: a plain
//! signal holding `Undefined`. When a real cell is later registered under
//! that name, each outstanding future starts mirroring it through an effect
//! owned by the registry.
//!
//! The registry holds futures weakly. A future nobody holds any more is
//! skipped at registration, and its mirror is stopped and dropped the next
//! time futures are spliced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::reactive::{Effect, Signal, WeakSignal};
use crate::state::State;
use crate::value::Value;

/// Opaque identity of a naming scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Generate a new unique scope ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A cell that can be bound to a name.
#[derive(Debug, Clone)]
pub enum NamedCell {
    Signal(Signal),
    State(State),
}

impl NamedCell {
    /// Identity comparison.
    pub fn ptr_eq(&self, other: &NamedCell) -> bool {
        match (self, other) {
            (NamedCell::Signal(a), NamedCell::Signal(b)) => a.ptr_eq(b),
            (NamedCell::State(a), NamedCell::State(b)) => State::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The cell as a value, wrapper kept.
    pub fn to_value(&self) -> Value {
        match self {
            NamedCell::Signal(signal) => Value::Signal(signal.clone()),
            NamedCell::State(state) => Value::State(state.clone()),
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            NamedCell::Signal(signal) => Some(signal),
            NamedCell::State(_) => None,
        }
    }

    pub fn as_state(&self) -> Option<&State> {
        match self {
            NamedCell::State(state) => Some(state),
            NamedCell::Signal(_) => None,
        }
    }
}

impl From<Signal> for NamedCell {
    fn from(signal: Signal) -> Self {
        NamedCell::Signal(signal)
    }
}

impl From<State> for NamedCell {
    fn from(state: State) -> Self {
        NamedCell::State(state)
    }
}

/// Global and scoped name tables.
#[derive(Default)]
pub struct Registry {
    global: RwLock<IndexMap<String, NamedCell>>,
    scopes: RwLock<HashMap<ScopeId, IndexMap<String, NamedCell>>>,
    scope_parents: RwLock<HashMap<ScopeId, ScopeId>>,
    futures: Mutex<HashMap<String, Vec<WeakSignal>>>,
    mirrors: Mutex<Vec<Mirror>>,
}

/// The effect copying a registered cell into one future.
struct Mirror {
    future: WeakSignal,
    effect: Effect,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `cell`, globally or in `scope`.
    ///
    /// Any futures waiting for the name start mirroring the cell.
    pub fn register(&self, name: &str, cell: NamedCell, scope: Option<ScopeId>) -> Result<()> {
        let newly_bound = match scope {
            Some(scope) => Self::bind(self.scopes.write().entry(scope).or_default(), name, &cell),
            None => Self::bind(&mut self.global.write(), name, &cell),
        }?;

        if newly_bound {
            debug!(name = %name, scope = ?scope, "registered named cell");
            self.resolve_futures(name, &cell);
        }
        Ok(())
    }

    fn bind(table: &mut IndexMap<String, NamedCell>, name: &str, cell: &NamedCell) -> Result<bool> {
        match table.get(name) {
            Some(existing) if existing.ptr_eq(cell) => Ok(false),
            Some(_) => Err(Error::NameCollision {
                name: name.to_string(),
            }),
            None => {
                table.insert(name.to_string(), cell.clone());
                Ok(true)
            }
        }
    }

    fn resolve_futures(&self, name: &str, cell: &NamedCell) {
        let Some(futures) = self.futures.lock().remove(name) else {
            return;
        };
        let live: Vec<Signal> = futures.iter().filter_map(WeakSignal::upgrade).collect();
        debug!(name = %name, count = live.len(), "splicing futures");

        // Mirrors run once on creation, so no lock is held while building them.
        let created: Vec<Mirror> = live
            .iter()
            .map(|future| {
                let source = cell.clone();
                let target = future.downgrade();
                let effect = Effect::new(move || {
                    let Some(future) = target.upgrade() else {
                        return;
                    };
                    let value = match &source {
                        NamedCell::Signal(signal) => signal.get(),
                        NamedCell::State(state) => Value::State(state.clone()),
                    };
                    future.set(value);
                });
                Mirror {
                    future: future.downgrade(),
                    effect,
                }
            })
            .collect();

        let mut mirrors = self.mirrors.lock();
        mirrors.retain(|mirror| {
            let alive = mirror.future.upgrade().is_some();
            if !alive {
                mirror.effect.stop();
            }
            alive
        });
        mirrors.extend(created);
    }

    /// Find the cell bound to `name`, walking up from `scope` and falling
    /// back to the global namespace.
    pub fn lookup(&self, name: &str, scope: Option<ScopeId>) -> Option<NamedCell> {
        let mut current = scope;
        {
            let scopes = self.scopes.read();
            let parents = self.scope_parents.read();
            while let Some(id) = current {
                if let Some(cell) = scopes.get(&id).and_then(|table| table.get(name)) {
                    return Some(cell.clone());
                }
                current = parents.get(&id).copied();
            }
        }
        self.global.read().get(name).cloned()
    }

    /// A placeholder signal that will mirror `name` once it is registered.
    pub fn future(&self, name: &str) -> Signal {
        let future = Signal::new(Value::Undefined);
        let mut futures = self.futures.lock();
        let waiting = futures.entry(name.to_string()).or_default();
        waiting.retain(|f| f.upgrade().is_some());
        waiting.push(future.downgrade());
        future
    }

    /// Number of live futures still waiting for `name`.
    pub fn pending_futures(&self, name: &str) -> usize {
        self.futures.lock().get(name).map_or(0, |waiting| {
            waiting.iter().filter(|f| f.upgrade().is_some()).count()
        })
    }

    /// Number of mirror effects currently held.
    pub fn mirror_count(&self) -> usize {
        self.mirrors.lock().len()
    }

    /// Declare `parent` as the enclosing scope of `child`.
    pub fn set_scope_parent(&self, child: ScopeId, parent: ScopeId) {
        self.scope_parents.write().insert(child, parent);
    }

    pub fn scope_parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scope_parents.read().get(&scope).copied()
    }

    /// Forget a scope's names and its parent link.
    pub fn remove_scope(&self, scope: ScopeId) {
        self.scopes.write().remove(&scope);
        self.scope_parents.write().remove(&scope);
    }

    /// Names bound directly in `scope` (or globally for `None`).
    pub fn names(&self, scope: Option<ScopeId>) -> Vec<String> {
        match scope {
            Some(scope) => self
                .scopes
                .read()
                .get(&scope)
                .map(|table| table.keys().cloned().collect())
                .unwrap_or_default(),
            None => self.global.read().keys().cloned().collect(),
        }
    }

    /// Drop every binding, future and mirror.
    pub fn clear(&self) {
        let mirrors = std::mem::take(&mut *self.mirrors.lock());
        for mirror in &mirrors {
            mirror.effect.stop();
        }
        self.global.write().clear();
        self.scopes.write().clear();
        self.scope_parents.write().clear();
        self.futures.lock().clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("global", &self.global.read().len())
            .field("scopes", &self.scopes.read().len())
            .field("futures", &self.futures.lock().len())
            .finish()
    }
}
