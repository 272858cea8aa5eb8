//! The unwrapped container behind a state.

use std::sync::Weak;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::value::{ArrayRef, DateRef, ObjectRef, Value};

use super::StateKind;

/// A container the state layer knows how to wrap.
#[derive(Clone)]
pub(crate) enum Raw {
    Object(ObjectRef),
    Array(ArrayRef),
    Date(DateRef),
}

impl Raw {
    /// Extract a wrappable container; everything else is passed through.
    pub(crate) fn from_value(value: &Value) -> Option<Raw> {
        match value {
            Value::Object(obj) => Some(Raw::Object(obj.clone())),
            Value::Array(arr) => Some(Raw::Array(arr.clone())),
            Value::Date(date) => Some(Raw::Date(date.clone())),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> StateKind {
        match self {
            Raw::Object(_) => StateKind::Object,
            Raw::Array(_) => StateKind::Array,
            Raw::Date(_) => StateKind::Date,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        match self {
            Raw::Object(obj) => obj.addr(),
            Raw::Array(arr) => arr.addr(),
            Raw::Date(date) => date.addr(),
        }
    }

    pub(crate) fn downgrade(&self) -> RawWeak {
        match self {
            Raw::Object(obj) => RawWeak::Object(obj.downgrade()),
            Raw::Array(arr) => RawWeak::Array(arr.downgrade()),
            Raw::Date(date) => RawWeak::Date(date.downgrade()),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            Raw::Object(obj) => Value::Object(obj.clone()),
            Raw::Array(arr) => Value::Array(arr.clone()),
            Raw::Date(date) => Value::Date(date.clone()),
        }
    }
}

/// Weak counterpart of [`Raw`], used for cache liveness and parent links.
#[derive(Clone)]
pub(crate) enum RawWeak {
    Object(Weak<RwLock<IndexMap<String, Value>>>),
    Array(Weak<RwLock<Vec<Value>>>),
    Date(Weak<RwLock<f64>>),
}

impl RawWeak {
    pub(crate) fn upgrade(&self) -> Option<Raw> {
        match self {
            RawWeak::Object(weak) => ObjectRef::upgrade(weak).map(Raw::Object),
            RawWeak::Array(weak) => ArrayRef::upgrade(weak).map(Raw::Array),
            RawWeak::Date(weak) => DateRef::upgrade(weak).map(Raw::Date),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        match self {
            RawWeak::Object(weak) => weak.strong_count() > 0,
            RawWeak::Array(weak) => weak.strong_count() > 0,
            RawWeak::Date(weak) => weak.strong_count() > 0,
        }
    }
}
