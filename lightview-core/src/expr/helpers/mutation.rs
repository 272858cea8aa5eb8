//! Path-aware helpers that write through their first argument.
//!
//! The target arrives as a binding, a signal or a state, never as a plain
//! value. Targets are read untracked: an effect that increments a counter
//! must not subscribe to that counter.

use crate::error::{Error, Result};
use crate::reactive::untracked;
use crate::value::Value;

use super::{arg, HelperOptions, HelperTable};

fn read(target: &Value) -> Value {
    untracked(|| target.unwrap_cell())
}

fn write(target: &Value, value: Value) -> Result<()> {
    match target {
        Value::Binding(binding) => binding.set_value(value),
        Value::Signal(signal) => {
            signal.set(value);
            Ok(())
        }
        Value::State(state) => Err(Error::NotWritable(format!(
            "a whole {} state; address one of its properties",
            state.kind().type_name()
        ))),
        other => Err(Error::NotWritable(format!("a {} value", other.type_name()))),
    }
}

fn step(args: &[Value], sign: f64) -> Result<Value> {
    let target = args.first().cloned().unwrap_or_default();
    let by = match args.get(1) {
        Some(by) => by.unwrap_cell().to_number(),
        None => 1.0,
    };
    let next = Value::Number(read(&target).to_number() + sign * by);
    write(&target, next.clone())?;
    Ok(next)
}

fn push(args: &[Value]) -> Result<Value> {
    let target = args.first().cloned().unwrap_or_default();
    let value = arg(args, 1);
    match read(&target) {
        Value::State(state) => Ok(Value::from(state.push(value)?)),
        Value::Array(arr) => {
            let len = arr.push(value.to_raw());
            // The array changed in place, so the holder must be told.
            if let Value::Signal(signal) = &target {
                signal.notify();
            }
            Ok(Value::from(len))
        }
        other => Err(Error::helper(
            "push",
            format!("target is a {}, not an array", other.type_name()),
        )),
    }
}

pub(super) fn register(table: &HelperTable) {
    let opts = HelperOptions::path_aware();
    table.register("set", opts, |args| {
        let target = args.first().cloned().unwrap_or_default();
        let value = arg(args, 1);
        write(&target, value.clone())?;
        Ok(value)
    });
    table.register("increment", opts, |args| step(args, 1.0));
    table.register("decrement", opts, |args| step(args, -1.0));
    table.register("toggle", opts, |args| {
        let target = args.first().cloned().unwrap_or_default();
        let next = Value::Bool(!read(&target).is_truthy());
        write(&target, next.clone())?;
        Ok(next)
    });
    table.register("push", opts, push);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::BindingTarget;
    use crate::reactive::Signal;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        let table = HelperTable::new();
        register(&table);
        table.call(name, args).unwrap()
    }

    #[test]
    fn increments_signals_and_bindings() {
        let count = Signal::new(1);
        call("increment", &[Value::Signal(count.clone())]).unwrap();
        assert_eq!(count.get().as_f64(), Some(2.0));

        let obj = Value::from_json(&json!({ "n": 10 }));
        let binding = Value::Binding(BindingTarget::new(obj.clone(), "n"));
        call("decrement", &[binding, Value::from(3)]).unwrap();
        assert_eq!(obj.to_json(), json!({ "n": 7 }));
    }

    #[test]
    fn set_and_toggle() {
        let flag = Signal::new(false);
        call("toggle", &[Value::Signal(flag.clone())]).unwrap();
        assert_eq!(flag.get().as_bool(), Some(true));

        call("set", &[Value::Signal(flag.clone()), Value::from("on")]).unwrap();
        assert_eq!(flag.get().as_str(), Some("on"));
    }

    #[test]
    fn push_onto_a_signal_held_array_notifies() {
        let list = Signal::new(Value::array([1]));
        let len = call("push", &[Value::Signal(list.clone()), Value::from(2)]).unwrap();
        assert_eq!(len.as_f64(), Some(2.0));
        assert_eq!(list.get().to_json(), json!([1, 2]));
    }

    #[test]
    fn plain_values_are_not_writable() {
        let err = call("set", &[Value::from(3), Value::from(4)]).unwrap_err();
        assert!(matches!(err, Error::NotWritable(_)));
    }
}
