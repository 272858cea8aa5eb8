//! Arithmetic helpers.

use crate::error::Result;
use crate::value::Value;

use super::{arg, flatten, HelperOptions, HelperTable};

fn numbers(args: &[Value]) -> Result<Vec<f64>> {
    Ok(flatten(args)?.iter().map(Value::to_number).collect())
}

/// Fold the arguments left to right; no arguments gives `NaN`.
fn fold(args: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    let nums = numbers(args)?;
    let mut iter = nums.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Value::Number(f64::NAN));
    };
    Ok(Value::Number(iter.fold(first, f)))
}

fn unary(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value> {
    Ok(Value::Number(f(arg(args, 0).to_number())))
}

/// Like JavaScript `+`: any string operand makes it a concatenation.
fn add(args: &[Value]) -> Result<Value> {
    let values = flatten(args)?;
    if values.iter().any(|v| matches!(v, Value::String(_))) {
        return Ok(Value::from(values.iter().map(Value::to_string).collect::<String>()));
    }
    Ok(Value::Number(values.iter().map(Value::to_number).sum()))
}

fn round(args: &[Value]) -> Result<Value> {
    let n = arg(args, 0).to_number();
    let digits = args.get(1).map_or(0.0, |d| d.unwrap_cell().to_number());
    if digits.is_nan() || digits == 0.0 {
        return Ok(Value::Number(n.round()));
    }
    let factor = 10f64.powi(digits as i32);
    Ok(Value::Number((n * factor).round() / factor))
}

fn extreme(args: &[Value], pick: fn(f64, f64) -> f64, empty: f64) -> Result<Value> {
    let nums = numbers(args)?;
    if nums.iter().any(|n| n.is_nan()) {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(nums.into_iter().fold(empty, pick)))
}

fn avg(args: &[Value]) -> Result<Value> {
    let nums = numbers(args)?;
    if nums.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(nums.iter().sum::<f64>() / nums.len() as f64))
}

pub(super) fn register(table: &HelperTable) {
    let opts = HelperOptions::default();
    table.register("add", opts, add);
    table.register("sub", opts, |args| fold(args, |a, b| a - b));
    table.register("mul", opts, |args| fold(args, |a, b| a * b));
    table.register("div", opts, |args| fold(args, |a, b| a / b));
    table.register("mod", opts, |args| fold(args, |a, b| a % b));
    table.register("pow", opts, |args| fold(args, f64::powf));
    table.register("abs", opts, |args| unary(args, f64::abs));
    table.register("floor", opts, |args| unary(args, f64::floor));
    table.register("ceil", opts, |args| unary(args, f64::ceil));
    table.register("round", opts, round);
    table.register("min", opts, |args| extreme(args, f64::min, f64::INFINITY));
    table.register("max", opts, |args| extreme(args, f64::max, f64::NEG_INFINITY));
    table.register("sum", opts, |args| Ok(Value::Number(numbers(args)?.iter().sum())));
    table.register("avg", opts, avg);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        let table = HelperTable::new();
        register(&table);
        table.call(name, args).unwrap().unwrap()
    }

    #[test]
    fn add_sums_numbers_and_concatenates_strings() {
        assert_eq!(call("add", &[Value::from(2), Value::from(3)]).as_f64(), Some(5.0));
        assert_eq!(call("add", &[Value::from("a"), Value::from(1)]).as_str(), Some("a1"));
    }

    #[test]
    fn folds_left_to_right() {
        assert_eq!(call("sub", &[Value::from(10), Value::from(3), Value::from(2)]).as_f64(), Some(5.0));
        assert_eq!(call("div", &[Value::from(6), Value::from(2)]).as_f64(), Some(3.0));
        assert_eq!(call("mod", &[Value::from(7), Value::from(4)]).as_f64(), Some(3.0));
        assert_eq!(call("pow", &[Value::from(2), Value::from(10)]).as_f64(), Some(1024.0));
    }

    #[test]
    fn aggregates_flatten_arrays() {
        let list = Value::array([1, 2, 3]);
        assert_eq!(call("sum", &[list.clone()]).as_f64(), Some(6.0));
        assert_eq!(call("avg", &[list.clone()]).as_f64(), Some(2.0));
        assert_eq!(call("max", &[list, Value::from(10)]).as_f64(), Some(10.0));
    }

    #[test]
    fn round_to_digits() {
        assert_eq!(call("round", &[Value::from(2.346), Value::from(2)]).as_f64(), Some(2.35));
        assert_eq!(call("round", &[Value::from(2.5)]).as_f64(), Some(3.0));
    }
}
