//! Comparison and boolean helpers.

use std::cmp::Ordering;

use crate::error::Result;
use crate::value::Value;

use super::{arg, HelperOptions, HelperTable};

/// Loose equality: identical values, or equal numbers when both sides
/// coerce cleanly, or equal text.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.strict_eq(b) {
        return true;
    }
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_) | Value::Bool(_), _) | (_, Value::Number(_) | Value::Bool(_)) => {
            let (x, y) = (a.to_number(), b.to_number());
            !x.is_nan() && x == y
        }
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

/// Numeric order when both sides are numbers (or numeric text), text order
/// otherwise. `None` when either side is `NaN`.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    a.to_number().partial_cmp(&b.to_number())
}

fn ordered(args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value> {
    let result = compare(&arg(args, 0), &arg(args, 1)).is_some_and(accept);
    Ok(Value::Bool(result))
}

pub(super) fn register(table: &HelperTable) {
    let opts = HelperOptions::default();
    table.register("eq", opts, |args| Ok(Value::Bool(loose_eq(&arg(args, 0), &arg(args, 1)))));
    table.register("neq", opts, |args| Ok(Value::Bool(!loose_eq(&arg(args, 0), &arg(args, 1)))));
    table.register("gt", opts, |args| ordered(args, Ordering::is_gt));
    table.register("gte", opts, |args| ordered(args, Ordering::is_ge));
    table.register("lt", opts, |args| ordered(args, Ordering::is_lt));
    table.register("lte", opts, |args| ordered(args, Ordering::is_le));

    table.register("and", opts, |args| {
        Ok(Value::Bool(args.iter().all(|a| a.unwrap_cell().is_truthy())))
    });
    table.register("or", opts, |args| {
        Ok(Value::Bool(args.iter().any(|a| a.unwrap_cell().is_truthy())))
    });
    table.register("not", opts, |args| Ok(Value::Bool(!arg(args, 0).is_truthy())));
    table.register("if", opts, |args| {
        Ok(if arg(args, 0).is_truthy() {
            arg(args, 1)
        } else {
            arg(args, 2)
        })
    });
}
