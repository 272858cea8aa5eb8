//! Writable (container, key) pairs.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::reactive::untracked;
use crate::state::array_index;
use crate::value::Value;

struct BindingInner {
    container: Value,
    key: String,
}

/// The last step of a resolved path, kept open for reading and writing.
///
/// Reading goes through the container the same way path traversal does,
/// so a binding over a [`State`](crate::state::State) property is a tracked
/// read. The key need not exist yet.
#[derive(Clone)]
pub struct BindingTarget {
    inner: Arc<BindingInner>,
}

impl BindingTarget {
    pub fn new(container: Value, key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BindingInner {
                container,
                key: key.into(),
            }),
        }
    }

    pub fn container(&self) -> &Value {
        &self.inner.container
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Current value of the property.
    pub fn value(&self) -> Value {
        read_key(&self.inner.container, &self.inner.key)
    }

    pub fn value_untracked(&self) -> Value {
        untracked(|| self.value())
    }

    /// Write the property. If it currently holds a signal, the signal is
    /// written instead of being replaced.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let key = self.inner.key.as_str();

        if let Value::Signal(signal) = self.value_untracked() {
            signal.set(value);
            return Ok(());
        }

        match &self.inner.container {
            Value::State(state) => state.set(key, value),
            Value::Object(obj) => {
                obj.insert(key, value.to_raw());
                Ok(())
            }
            Value::Array(arr) => match array_index(key) {
                Some(index) => {
                    arr.set(index, value.to_raw());
                    Ok(())
                }
                None => Err(Error::NotWritable(format!("array property `{key}`"))),
            },
            other => Err(Error::NotWritable(format!("a {} container", other.type_name()))),
        }
    }

    pub fn ptr_eq(&self, other: &BindingTarget) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Index a container by one key. Anything that cannot be indexed yields
/// `Undefined`.
pub(crate) fn read_key(container: &Value, key: &str) -> Value {
    match container {
        Value::State(state) => state.get(key),
        Value::Object(obj) => obj.get(key).unwrap_or_default(),
        Value::Array(arr) => {
            if key == "length" {
                return Value::from(arr.len());
            }
            array_index(key)
                .and_then(|index| arr.get(index))
                .unwrap_or_default()
        }
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Undefined,
    }
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTarget")
            .field("container", &self.inner.container.type_name())
            .field("key", &self.inner.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use serde_json::json;

    #[test]
    fn reads_and_writes_raw_objects() {
        let obj = Value::from_json(&json!({ "a": 1 }));
        let binding = BindingTarget::new(obj.clone(), "a");
        assert_eq!(binding.value().as_f64(), Some(1.0));

        binding.set_value(2).unwrap();
        assert_eq!(obj.to_json(), json!({ "a": 2 }));
    }

    #[test]
    fn missing_keys_can_be_created() {
        let obj = Value::from_json(&json!({}));
        let binding = BindingTarget::new(obj.clone(), "fresh");
        assert!(binding.value().is_undefined());
        binding.set_value("x").unwrap();
        assert_eq!(obj.to_json(), json!({ "fresh": "x" }));
    }

    #[test]
    fn signal_properties_are_written_through() {
        let signal = Signal::new(1);
        let obj = Value::object([("count", Value::Signal(signal.clone()))]);
        BindingTarget::new(obj, "count").set_value(5).unwrap();
        assert_eq!(signal.get().as_f64(), Some(5.0));
    }

    #[test]
    fn primitives_are_not_writable() {
        let binding = BindingTarget::new(Value::from(3), "x");
        assert!(binding.value().is_undefined());
        assert!(matches!(binding.set_value(1), Err(Error::NotWritable(_))));
    }
}
