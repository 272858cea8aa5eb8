//! Text helpers.

use crate::error::Result;
use crate::value::Value;

use super::{arg, elements, flatten, is_array_like, HelperOptions, HelperTable};

fn text(args: &[Value], f: impl Fn(&str) -> String) -> Result<Value> {
    Ok(Value::from(f(&arg(args, 0).to_string())))
}

fn len(args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    if is_array_like(&target) {
        return Ok(Value::from(elements(&target)?.len()));
    }
    match target {
        Value::Undefined | Value::Null => Ok(Value::from(0)),
        Value::State(state) => Ok(Value::from(state.len())),
        Value::Object(obj) => Ok(Value::from(obj.len())),
        other => Ok(Value::from(other.to_string().chars().count())),
    }
}

fn join(args: &[Value]) -> Result<Value> {
    let separator = args.get(1).map_or_else(|| ",".to_string(), |s| s.unwrap_cell().to_string());
    let parts: Vec<String> = elements(&arg(args, 0))?
        .iter()
        .map(|item| {
            let item = item.unwrap_cell();
            if item.is_nullish() {
                String::new()
            } else {
                item.to_string()
            }
        })
        .collect();
    Ok(Value::from(parts.join(&separator)))
}

fn includes(args: &[Value]) -> Result<Value> {
    let haystack = arg(args, 0);
    let needle = arg(args, 1);
    if is_array_like(&haystack) {
        let needle = needle.to_raw();
        let found = elements(&haystack)?
            .iter()
            .any(|item| item.to_raw().strict_eq(&needle));
        return Ok(Value::Bool(found));
    }
    Ok(Value::Bool(haystack.to_string().contains(&needle.to_string())))
}

pub(super) fn register(table: &HelperTable) {
    let opts = HelperOptions::default();
    table.register("concat", opts, |args| {
        Ok(Value::from(flatten(args)?.iter().map(Value::to_string).collect::<String>()))
    });
    table.register("upper", opts, |args| text(args, str::to_uppercase));
    table.register("lower", opts, |args| text(args, str::to_lowercase));
    table.register("trim", opts, |args| text(args, |s| s.trim().to_string()));
    table.register("len", opts, len);
    table.register("join", opts, join);
    table.register("includes", opts, includes);
}
