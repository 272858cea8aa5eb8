//! Monitored array methods.
//!
//! Mutating methods run against the raw array, then compare it with the
//! snapshot taken before the call. If anything changed, every materialised
//! index signal is brought back in line with the raw array, the length
//! monitor is updated (waking only length readers whose length actually
//! changed) and the version is bumped. Tracking methods read the version
//! before doing their work.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::value::{ArrayRef, Value};

use super::{Raw, State};

/// Parse a canonical array index (`"0"`, `"12"`, never `"01"`).
pub(crate) fn index_key(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}

/// The order `Array.prototype.sort` uses without a comparator: undefined
/// last, everything else by string form.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.to_string().cmp(&b.to_string()),
    }
}

fn clamp_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let index = if index < 0 { (len + index).max(0) } else { index.min(len) };
    index as usize
}

impl State {
    fn array(&self, operation: &'static str) -> Result<&ArrayRef> {
        match &self.inner.raw {
            Raw::Array(arr) => Ok(arr),
            other => Err(Error::Unsupported {
                operation,
                kind: other.kind().type_name(),
            }),
        }
    }

    pub(super) fn set_index(&self, arr: &ArrayRef, key: &str, value: Value) -> Result<()> {
        if key == "length" {
            let len = value.to_number();
            if !(len >= 0.0 && len.fract() == 0.0) {
                return Err(Error::NotWritable(format!("array length {value}")));
            }
            return self.set_len(len as usize);
        }
        let Some(index) = index_key(key) else {
            return Err(Error::NotWritable(format!("array property `{key}`")));
        };
        self.validate(key, &value)?;

        let before = arr.to_vec();
        arr.set(index, value);
        self.sync_array(arr, &before);
        Ok(())
    }

    fn mutate<R>(&self, operation: &'static str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let arr = self.array(operation)?;
        let before = arr.to_vec();
        let result = arr.with_mut(f);
        self.sync_array(arr, &before);
        Ok(result)
    }

    fn sync_array(&self, arr: &ArrayRef, before: &[Value]) {
        let after = arr.to_vec();
        let changed = before.len() != after.len()
            || before.iter().zip(&after).any(|(a, b)| !a.strict_eq(b));
        if !changed {
            return;
        }

        let slot = &self.inner.slot;
        for (key, signal) in slot.materialized() {
            if let Some(index) = index_key(&key) {
                signal.set(after.get(index).cloned().unwrap_or_default());
            }
        }
        slot.monitor.set(after.len());
        slot.bump_version();
        self.persist();
    }

    // ------------------------------------------------------------------
    // Mutating
    // ------------------------------------------------------------------

    /// Append an element, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into().to_raw();
        self.mutate("push", |items| {
            items.push(value);
            items.len()
        })
    }

    pub fn pop(&self) -> Result<Value> {
        self.mutate("pop", |items| items.pop().unwrap_or_default())
    }

    pub fn shift(&self) -> Result<Value> {
        self.mutate("shift", |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
    }

    /// Prepend an element, returning the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into().to_raw();
        self.mutate("unshift", |items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` (negative counts from the
    /// end) and insert `insert` in their place. Returns the removed
    /// elements.
    pub fn splice(&self, start: i64, delete_count: usize, insert: Vec<Value>) -> Result<Vec<Value>> {
        let insert: Vec<Value> = insert.iter().map(Value::to_raw).collect();
        self.mutate("splice", |items| {
            let start = clamp_index(start, items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, insert).collect()
        })
    }

    /// Sort by string form, undefined last.
    pub fn sort(&self) -> Result<()> {
        self.sort_by(default_order)
    }

    /// Sort with a comparator. The comparator sees raw elements and runs
    /// without any lock held.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        let arr = self.array("sort")?;
        let before = arr.to_vec();
        let mut sorted = before.clone();
        sorted.sort_by(compare);
        arr.with_mut(|items| *items = sorted);
        self.sync_array(arr, &before);
        Ok(())
    }

    pub fn reverse(&self) -> Result<()> {
        self.mutate("reverse", |items| items.reverse())
    }

    /// Overwrite every element with `value`.
    pub fn fill(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into().to_raw();
        self.mutate("fill", |items| items.fill(value))
    }

    /// Truncate or pad with `Undefined`.
    pub fn set_len(&self, len: usize) -> Result<()> {
        self.mutate("set_len", |items| items.resize(len, Value::Undefined))
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Array length or object key count. Tracks the monitor.
    pub fn len(&self) -> usize {
        match &self.inner.raw {
            Raw::Date(_) => 0,
            _ => self.inner.slot.monitor.get().to_number() as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The elements, with nested containers wrapped and parented here.
    pub fn items(&self) -> Result<Vec<Value>> {
        let arr = self.array("items")?;
        self.inner.slot.version.track();
        Ok(arr
            .to_vec()
            .into_iter()
            .map(|item| self.wrap_child(item))
            .collect())
    }

    pub fn slice(&self, start: i64, end: Option<i64>) -> Result<Vec<Value>> {
        let items = self.items()?;
        let start = clamp_index(start, items.len());
        let end = end.map_or(items.len(), |end| clamp_index(end, items.len()));
        Ok(items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default())
    }

    pub fn index_of(&self, needle: &Value) -> Result<Option<usize>> {
        let arr = self.array("index_of")?;
        self.inner.slot.version.track();
        let needle = needle.to_raw();
        Ok(arr.to_vec().iter().position(|item| item.strict_eq(&needle)))
    }

    pub fn includes(&self, needle: &Value) -> Result<bool> {
        Ok(self.index_of(needle)?.is_some())
    }

    pub fn join(&self, separator: &str) -> Result<String> {
        let arr = self.array("join")?;
        self.inner.slot.version.track();
        let parts: Vec<String> = arr
            .to_vec()
            .iter()
            .map(|item| if item.is_nullish() { String::new() } else { item.to_string() })
            .collect();
        Ok(parts.join(separator))
    }

    pub fn for_each(&self, mut f: impl FnMut(&Value, usize)) -> Result<()> {
        for (index, item) in self.items()?.iter().enumerate() {
            f(item, index);
        }
        Ok(())
    }

    pub fn map<T>(&self, mut f: impl FnMut(&Value, usize) -> T) -> Result<Vec<T>> {
        Ok(self
            .items()?
            .iter()
            .enumerate()
            .map(|(index, item)| f(item, index))
            .collect())
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> Result<Vec<Value>> {
        Ok(self.items()?.into_iter().filter(|item| predicate(item)).collect())
    }

    pub fn find(&self, mut predicate: impl FnMut(&Value) -> bool) -> Result<Option<Value>> {
        Ok(self.items()?.into_iter().find(|item| predicate(item)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{env, wrap};
    use super::*;
    use crate::reactive::Effect;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn length_watcher(state: &State) -> (Effect, Arc<AtomicI32>) {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let state = state.clone();
        let effect = Effect::new(move || {
            state.get("length");
            runs_clone.fetch_add(1, AtomicOrdering::SeqCst);
        });
        (effect, runs)
    }

    #[test]
    fn index_keys_are_canonical() {
        assert_eq!(index_key("3"), Some(3));
        assert_eq!(index_key("03"), None);
        assert_eq!(index_key("-1"), None);
        assert_eq!(index_key("x"), None);
    }

    #[test]
    fn push_wakes_length_readers() {
        let env = env();
        let arr = wrap(&env, json!([1, 2, 3]));
        let (_effect, runs) = length_watcher(&arr);

        assert_eq!(arr.push(4).unwrap(), 4);
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(arr.get("length").as_f64(), Some(4.0));
    }

    #[test]
    fn pure_methods_do_not_wake_length_readers() {
        let env = env();
        let arr = wrap(&env, json!([1, 2, 3]));
        let (_effect, runs) = length_watcher(&arr);

        assert_eq!(arr.slice(0, None).unwrap().len(), 3);
        assert!(arr.includes(&Value::from(2)).unwrap());
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn reorder_keeps_length_readers_asleep_but_wakes_iterators() {
        let env = env();
        let arr = wrap(&env, json!([3, 1, 2]));
        let (_effect, length_runs) = length_watcher(&arr);

        let joined = Arc::new(parking_lot::Mutex::new(String::new()));
        let joined_clone = joined.clone();
        let arr_clone = arr.clone();
        let _iter = Effect::new(move || {
            *joined_clone.lock() = arr_clone.join(",").unwrap();
        });

        arr.sort().unwrap();
        assert_eq!(*joined.lock(), "1,2,3");
        assert_eq!(length_runs.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn index_signals_resync_after_mutation() {
        let env = env();
        let arr = wrap(&env, json!(["a", "b", "c"]));
        let first = Arc::new(parking_lot::Mutex::new(String::new()));

        let first_clone = first.clone();
        let arr_clone = arr.clone();
        let _effect = Effect::new(move || {
            *first_clone.lock() = arr_clone.at(0).to_string();
        });

        arr.shift().unwrap();
        assert_eq!(*first.lock(), "b");
        arr.unshift("z").unwrap();
        assert_eq!(*first.lock(), "z");
    }

    #[test]
    fn splice_removes_and_inserts() {
        let env = env();
        let arr = wrap(&env, json!([1, 2, 3, 4]));
        let removed = arr.splice(-3, 2, vec![Value::from(9)]).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(arr.to_json(), json!([1, 9, 4]));
    }

    #[test]
    fn writing_past_the_end_grows_the_array() {
        let env = env();
        let arr = wrap(&env, json!([1]));
        let (_effect, runs) = length_watcher(&arr);

        arr.set("2", 3).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 2);
        assert!(matches!(arr.set("x", 1), Err(Error::NotWritable(_))));
    }

    #[test]
    fn items_are_wrapped_and_parented() {
        let env = env();
        let arr = wrap(&env, json!([{ "v": 1 }]));
        let items = arr.items().unwrap();
        let Value::State(item) = &items[0] else {
            panic!("expected wrapped item");
        };
        assert!(State::ptr_eq(&item.parent().unwrap(), &arr));
    }

    #[test]
    fn array_methods_reject_objects() {
        let env = env();
        let obj = wrap(&env, json!({}));
        let err = obj.push(1).unwrap_err();
        assert!(matches!(err, Error::Unsupported { operation: "push", kind: "object" }));
    }
}
