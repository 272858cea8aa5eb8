//! Helper functions callable from expressions.
//!
//! A helper is a plain function over evaluated arguments. Two flags change
//! how the evaluator prepares those arguments:
//!
//! - `path_aware`: the first argument is resolved as a context, so the
//!   helper receives a [`BindingTarget`](crate::path::BindingTarget),
//!   signal or state it can write through, not the current value.
//! - `lazy_aware`: [`LazyValue`](super::LazyValue) arguments after the
//!   first are passed through for the helper to resolve per item, instead
//!   of turning the whole call lazy. The first argument is the collection;
//!   if it is lazy the call is deferred like any other.

mod array;
mod logic;
mod math;
mod mutation;
mod string;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Result;
use crate::value::Value;

/// Signature of a helper.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// How the evaluator prepares a helper's arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelperOptions {
    pub path_aware: bool,
    pub lazy_aware: bool,
}

impl HelperOptions {
    pub fn path_aware() -> Self {
        Self {
            path_aware: true,
            lazy_aware: false,
        }
    }

    pub fn lazy_aware() -> Self {
        Self {
            path_aware: false,
            lazy_aware: true,
        }
    }
}

/// A registered helper.
#[derive(Clone)]
pub struct Helper {
    func: HelperFn,
    options: HelperOptions,
}

impl Helper {
    pub fn options(&self) -> HelperOptions {
        self.options
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper")
            .field("options", &self.options)
            .finish()
    }
}

/// Name to helper map, safe to share across threads.
#[derive(Default)]
pub struct HelperTable {
    helpers: DashMap<String, Helper>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the standard helper library.
    pub fn with_builtins() -> Self {
        let table = Self::new();
        table.register_builtins();
        table
    }

    pub fn register_builtins(&self) {
        math::register(self);
        logic::register(self);
        string::register(self);
        array::register(self);
        mutation::register(self);
    }

    /// Register (or replace) a helper.
    pub fn register<F>(&self, name: impl Into<String>, options: HelperOptions, func: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.helpers.insert(
            name.into(),
            Helper {
                func: Arc::new(func),
                options,
            },
        );
    }

    /// Look a helper up. The returned handle is detached from the table, so
    /// calling it never holds a table lock.
    pub fn get(&self, name: &str) -> Option<Helper> {
        self.helpers.get(name).map(|entry| entry.value().clone())
    }

    /// Call a helper by name; `None` if it is not registered.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value>> {
        self.get(name).map(|helper| helper.call(args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    pub fn clear(&self) {
        self.helpers.clear();
    }
}

impl fmt::Debug for HelperTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperTable")
            .field("helpers", &self.helpers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Argument plumbing shared by the helper families
// ----------------------------------------------------------------------------

/// Read through cells to the value a helper should compute with.
fn plain(value: &Value) -> Value {
    value.unwrap_cell()
}

/// The elements of an array-like argument. State arrays are read tracked.
fn elements(value: &Value) -> Result<Vec<Value>> {
    match plain(value) {
        Value::State(state) if state.kind() == crate::state::StateKind::Array => state.items(),
        Value::Array(arr) => Ok(arr.to_vec()),
        _ => Ok(Vec::new()),
    }
}

fn is_array_like(value: &Value) -> bool {
    match plain(value) {
        Value::Array(_) => true,
        Value::State(state) => state.kind() == crate::state::StateKind::Array,
        _ => false,
    }
}

/// Arguments with array arguments spread into their elements.
fn flatten(args: &[Value]) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if is_array_like(arg) {
            out.extend(elements(arg)?.iter().map(plain));
        } else {
            out.push(plain(arg));
        }
    }
    Ok(out)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).map(plain).unwrap_or_default()
}
