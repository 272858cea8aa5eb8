//! Shared container references.
//!
//! Objects and arrays are reference types: cloning a reference shares the
//! underlying storage, and equality between two references is identity, not
//! structure. That identity is what the state layer keys its caches on.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;

/// A shared, mutable, insertion-ordered map of properties.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<IndexMap<String, Value>>>);

impl ObjectRef {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from existing properties.
    pub fn from_map(map: IndexMap<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(map)))
    }

    /// Read a property.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Write a property, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.write().insert(key.into(), value.into())
    }

    /// Remove a property, keeping the order of the others.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.write().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.read().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<RwLock<IndexMap<String, Value>>> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<RwLock<IndexMap<String, Value>>>) -> Option<Self> {
        weak.upgrade().map(Self)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("keys", &self.keys())
            .finish()
    }
}

/// A shared, mutable list of values.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    pub fn push(&self, value: impl Into<Value>) -> usize {
        let mut items = self.0.write();
        items.push(value.into());
        items.len()
    }

    /// Write an element, padding with `Undefined` when writing past the end.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let mut items = self.0.write();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value.into();
    }

    /// Run `f` with exclusive access to the elements.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        f(&mut self.0.write())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<RwLock<Vec<Value>>> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<RwLock<Vec<Value>>>) -> Option<Self> {
        weak.upgrade().map(Self)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len())
            .finish()
    }
}

/// Kinds of host values the state layer passes through without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    Map,
    Set,
    WeakMap,
    WeakSet,
    RegExp,
    Other,
}

/// A host value the reactive layer never looks inside.
#[derive(Clone)]
pub struct OpaqueRef {
    kind: OpaqueKind,
    payload: Arc<dyn Any + Send + Sync>,
}

impl OpaqueRef {
    pub fn new<T: Any + Send + Sync>(kind: OpaqueKind, payload: T) -> Self {
        Self {
            kind,
            payload: Arc::new(payload),
        }
    }

    pub fn kind(&self) -> OpaqueKind {
        self.kind
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueRef").field("kind", &self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_clones_share_storage() {
        let a = ObjectRef::new();
        let b = a.clone();
        a.insert("x", 1);
        assert_eq!(b.get("x").and_then(|v| v.as_f64()), Some(1.0));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&ObjectRef::new()));
    }

    #[test]
    fn object_remove_keeps_order() {
        let obj = ObjectRef::new();
        obj.insert("a", 1);
        obj.insert("b", 2);
        obj.insert("c", 3);
        obj.remove("b");
        assert_eq!(obj.keys(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn array_set_pads_with_undefined() {
        let arr = ArrayRef::new();
        arr.set(2, "x");
        assert_eq!(arr.len(), 3);
        assert!(arr.get(0).is_some_and(|v| v.is_undefined()));
    }

    #[test]
    fn opaque_downcasts() {
        let pattern = OpaqueRef::new(OpaqueKind::RegExp, String::from("^a+$"));
        assert_eq!(pattern.kind(), OpaqueKind::RegExp);
        assert_eq!(pattern.downcast_ref::<String>().map(String::as_str), Some("^a+$"));
    }
}
