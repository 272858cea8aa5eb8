//! Deferred per-item values.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value::Value;

type Resolve = Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Result<Value> + Send + Sync>;

/// A value that cannot be computed until a concrete item (a loop element)
/// or an event payload is supplied.
///
/// Iteration helpers such as `filter` and `map` receive lazy arguments and
/// resolve them once per element. Event handlers resolve them with the
/// event. A value that needs both comes back lazy again when only one is
/// given.
#[derive(Clone)]
pub struct LazyValue {
    resolve: Resolve,
}

impl LazyValue {
    /// A lazy value over a single input, whichever of item or event is
    /// supplied.
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_inputs(move |item, event| match item.or(event) {
            Some(input) => resolve(input),
            None => resolve(&Value::Undefined),
        })
    }

    pub(crate) fn with_inputs<F>(resolve: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    /// Compute the value for a loop item.
    pub fn resolve(&self, item: &Value) -> Result<Value> {
        (self.resolve)(Some(item), None)
    }

    /// Compute the value for an event payload.
    pub fn resolve_event(&self, event: &Value) -> Result<Value> {
        (self.resolve)(None, Some(event))
    }

    /// Compute the value with both inputs at once.
    pub fn resolve_with(&self, item: &Value, event: &Value) -> Result<Value> {
        (self.resolve)(Some(item), Some(event))
    }

    pub fn ptr_eq(&self, other: &LazyValue) -> bool {
        Arc::ptr_eq(&self.resolve, &other.resolve)
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyValue(..)")
    }
}
