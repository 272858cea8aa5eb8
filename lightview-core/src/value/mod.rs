//! Dynamic Values
//!
//! Everything that flows through signals, state and expressions is a
//! [`Value`]. Primitives are compared by value; containers, cells and lazy
//! values are compared by identity, which is the "strict inequality" a signal
//! write uses to decide whether to notify.
//!
//! Cells are tagged explicitly: a [`Value::Signal`] or [`Value::Binding`] is a
//! reactive cell and is unwrapped by path traversal, whereas a
//! [`Value::State`] is a container that is indexed, never unwrapped. Nothing
//! is detected by probing for a `value` property.

mod date;
mod refs;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use date::DateRef;
pub use refs::{ArrayRef, ObjectRef, OpaqueKind, OpaqueRef};

use crate::expr::LazyValue;
use crate::path::BindingTarget;
use crate::reactive::Signal;
use crate::state::State;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Date(DateRef),
    /// Map, Set, RegExp and friends: carried around, never wrapped.
    Opaque(OpaqueRef),
    Signal(Signal),
    State(State),
    Binding(BindingTarget),
    Lazy(LazyValue),
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::Object(ObjectRef::from_map(map))
    }

    /// Build an array value.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Array(ArrayRef::from_vec(items.into_iter().map(Into::into).collect()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Whether this value is a reactive cell that traversal unwraps.
    pub fn is_reactive_cell(&self) -> bool {
        matches!(self, Value::Signal(_) | Value::Binding(_))
    }

    /// Whether this value is an object, array or date, raw or wrapped.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Object(_) | Value::Array(_) | Value::Date(_) | Value::State(_)
        )
    }

    /// Name of the type, as the schema layer and error messages use it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Date(_) => "date",
            Value::Opaque(_) => "opaque",
            Value::Signal(_) => "signal",
            Value::State(state) => state.kind().type_name(),
            Value::Binding(_) => "binding",
            Value::Lazy(_) => "lazy",
        }
    }

    /// Identity for containers and cells, value equality for primitives.
    /// `NaN` is never equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Date(a), Value::Date(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            (Value::Signal(a), Value::Signal(b)) => a.ptr_eq(b),
            (Value::State(a), Value::State(b)) => State::ptr_eq(a, b),
            (Value::Binding(a), Value::Binding(b)) => a.ptr_eq(b),
            (Value::Lazy(a), Value::Lazy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Read through signals and bindings until a plain value remains.
    ///
    /// Reading a signal here is a tracked read.
    pub fn unwrap_cell(&self) -> Value {
        let mut current = self.clone();
        loop {
            current = match &current {
                Value::Signal(signal) => signal.get(),
                Value::Binding(binding) => binding.value(),
                _ => return current,
            };
        }
    }

    /// The underlying container if this is a state wrapper, else a clone.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::State(state) => state.raw(),
            other => other.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<&State> {
        match self {
            Value::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn as_binding(&self) -> Option<&BindingTarget> {
        match self {
            Value::Binding(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn as_lazy(&self) -> Option<&LazyValue> {
        match self {
            Value::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Signal(_) | Value::Binding(_) => self.unwrap_cell().is_truthy(),
            _ => true,
        }
    }

    /// Numeric coercion: `null` is 0, blank strings are 0, anything that
    /// does not parse is `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Date(date) => date.get_time(),
            Value::State(state) => state.raw().to_number(),
            Value::Signal(_) | Value::Binding(_) => self.unwrap_cell().to_number(),
            _ => f64::NAN,
        }
    }

    /// Convert from JSON. JSON never produces dates or cells.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(Arc::from(s.as_str())),
            serde_json::Value::Array(items) => {
                Value::Array(ArrayRef::from_vec(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(ObjectRef::from_map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            )),
        }
    }

    /// Snapshot as JSON without registering any dependency.
    ///
    /// Dates become ISO strings; undefined, opaque and lazy values become
    /// `null`. Object properties holding `undefined` are skipped.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) | Value::Lazy(_) => {
                serde_json::Value::Null
            }
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.to_vec().iter().map(Value::to_json).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.entries()
                    .into_iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
            Value::Date(date) => date
                .to_iso_string()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
            Value::Signal(signal) => signal.get_untracked().to_json(),
            Value::State(state) => state.raw().to_json(),
            Value::Binding(binding) => binding.value_untracked().to_json(),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

/// Format a number the way JavaScript's `String(n)` does for the common
/// cases: integers without a fraction, `NaN`, `Infinity`.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .to_vec()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                    .collect();
                f.write_str(&parts.join(","))
            }
            Value::Object(_) | Value::Opaque(_) => f.write_str("[object Object]"),
            Value::Date(date) => {
                f.write_str(date.to_iso_string().as_deref().unwrap_or("Invalid Date"))
            }
            Value::Signal(signal) => write!(f, "{}", signal.get_untracked()),
            Value::State(state) => write!(f, "{}", state.raw()),
            Value::Binding(binding) => write!(f, "{}", binding.value_untracked()),
            Value::Lazy(_) => f.write_str("[lazy]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(a) => a.fmt(f),
            Value::Object(o) => o.fmt(f),
            Value::Date(d) => d.fmt(f),
            Value::Opaque(o) => o.fmt(f),
            Value::Signal(s) => s.fmt(f),
            Value::State(s) => s.fmt(f),
            Value::Binding(b) => b.fmt(f),
            Value::Lazy(l) => l.fmt(f),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_vec(items))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<ArrayRef> for Value {
    fn from(arr: ArrayRef) -> Self {
        Value::Array(arr)
    }
}

impl From<DateRef> for Value {
    fn from(date: DateRef) -> Self {
        Value::Date(date)
    }
}

impl From<OpaqueRef> for Value {
    fn from(opaque: OpaqueRef) -> Self {
        Value::Opaque(opaque)
    }
}

impl From<Signal> for Value {
    fn from(signal: Signal) -> Self {
        Value::Signal(signal)
    }
}

impl From<State> for Value {
    fn from(state: State) -> Self {
        Value::State(state)
    }
}

impl From<BindingTarget> for Value {
    fn from(binding: BindingTarget) -> Self {
        Value::Binding(binding)
    }
}

impl From<LazyValue> for Value {
    fn from(lazy: LazyValue) -> Self {
        Value::Lazy(lazy)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Undefined, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_compare_by_value() {
        assert!(Value::from(1).strict_eq(&Value::from(1.0)));
        assert!(Value::from("a").strict_eq(&Value::from("a")));
        assert!(!Value::from(1).strict_eq(&Value::from("1")));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::from_json(&json!({ "x": 1 }));
        let b = Value::from_json(&json!({ "x": 1 }));
        assert!(a.strict_eq(&a.clone()));
        assert!(!a.strict_eq(&b));
    }

    #[test]
    fn json_conversion_keeps_integers() {
        let original = json!({ "x": 1, "y": [1, 2.5, "s"], "z": null, "b": true });
        assert_eq!(Value::from_json(&original).to_json(), original);
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::from(true).to_number(), 1.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::array(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn display_matches_string_coercion() {
        assert_eq!(Value::from(5.0).to_string(), "5");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::array([1, 2, 3]).to_string(), "1,2,3");
    }
}
