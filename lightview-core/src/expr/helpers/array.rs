//! Collection helpers. The iterating ones are lazy-aware: a predicate or
//! mapper written with `_` placeholders arrives as a
//! [`LazyValue`](crate::expr::LazyValue) and is resolved once per element.

use crate::error::Result;
use crate::value::Value;

use super::{arg, elements, is_array_like, plain, HelperOptions, HelperTable};

/// Apply a per-item argument: lazy values are resolved against the item,
/// anything else is a constant.
fn apply(arg: Option<&Value>, item: &Value) -> Result<Value> {
    match arg {
        Some(Value::Lazy(lazy)) => Ok(lazy.resolve(item)?.unwrap_cell()),
        Some(other) => Ok(plain(other)),
        None => Ok(item.unwrap_cell()),
    }
}

fn matches(predicate: Option<&Value>, item: &Value) -> Result<bool> {
    Ok(apply(predicate, item)?.is_truthy())
}

fn count(args: &[Value]) -> Result<Value> {
    if let [single] = args {
        if is_array_like(single) {
            return Ok(Value::from(elements(single)?.len()));
        }
    }
    Ok(Value::from(args.iter().filter(|a| !plain(a).is_nullish()).count()))
}

fn filter(args: &[Value]) -> Result<Value> {
    let mut kept = Vec::new();
    for item in elements(&arg(args, 0))? {
        if matches(args.get(1), &item)? {
            kept.push(item.to_raw());
        }
    }
    Ok(Value::from(kept))
}

fn map(args: &[Value]) -> Result<Value> {
    let mapped = elements(&arg(args, 0))?
        .iter()
        .map(|item| apply(args.get(1), item).map(|v| v.to_raw()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::from(mapped))
}

fn find(args: &[Value]) -> Result<Value> {
    for item in elements(&arg(args, 0))? {
        if matches(args.get(1), &item)? {
            return Ok(item);
        }
    }
    Ok(Value::Undefined)
}

/// `sumIf(list, predicate, value?)`: sum `value` (or the item itself) over
/// the items matching `predicate`.
fn sum_if(args: &[Value]) -> Result<Value> {
    let mut total = 0.0;
    for item in elements(&arg(args, 0))? {
        if matches(args.get(1), &item)? {
            total += apply(args.get(2), &item)?.to_number();
        }
    }
    Ok(Value::Number(total))
}

fn count_if(args: &[Value]) -> Result<Value> {
    let mut total = 0usize;
    for item in elements(&arg(args, 0))? {
        if matches(args.get(1), &item)? {
            total += 1;
        }
    }
    Ok(Value::from(total))
}

pub(super) fn register(table: &HelperTable) {
    let eager = HelperOptions::default();
    let lazy = HelperOptions::lazy_aware();
    table.register("count", eager, count);
    table.register("first", eager, |args| {
        Ok(elements(&arg(args, 0))?.into_iter().next().unwrap_or_default())
    });
    table.register("last", eager, |args| {
        Ok(elements(&arg(args, 0))?.pop().unwrap_or_default())
    });
    table.register("filter", lazy, filter);
    table.register("map", lazy, map);
    table.register("find", lazy, find);
    table.register("sumIf", lazy, sum_if);
    table.register("countIf", lazy, count_if);
}
