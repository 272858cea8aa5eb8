//! Write-time schemas for object states.
//!
//! A schema is attached to one state (it is not inherited by the objects
//! reachable from it) and vets every property write:
//!
//! - [`SchemaBehavior::Auto`]: the written value must have the type of the
//!   value already there, and keys that do not exist yet are rejected.
//! - [`SchemaBehavior::Dynamic`]: same type rule, but new keys are allowed.
//! - [`SchemaBehavior::Polymorphic`]: the written value is coerced to the
//!   type of the value already there.
//!
//! An optional [`Transform`] runs first, before any type rule.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::expr::HelperTable;
use crate::value::Value;

/// How a schema treats writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaBehavior {
    #[default]
    Auto,
    Dynamic,
    Polymorphic,
}

/// A value rewrite applied before the type rules.
#[derive(Clone)]
pub enum Transform {
    /// A helper looked up by name, called with the value as its only
    /// argument.
    Helper(String),
    Func(Arc<dyn Fn(Value) -> Value + Send + Sync>),
}

impl Transform {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Transform::Func(Arc::new(f))
    }

    fn apply(&self, value: Value, helpers: &HelperTable) -> Result<Value> {
        match self {
            Transform::Func(f) => Ok(f(value)),
            Transform::Helper(name) => match helpers.call(name, &[value.clone()]) {
                Some(result) => result,
                None => {
                    warn!(helper = %name, "schema transform helper is not registered");
                    Ok(value)
                }
            },
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Helper(name) => f.debug_tuple("Helper").field(name).finish(),
            Transform::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Type rules and an optional transform for one state.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub behavior: SchemaBehavior,
    pub transform: Option<Transform>,
}

impl Schema {
    pub fn new(behavior: SchemaBehavior) -> Self {
        Self {
            behavior,
            transform: None,
        }
    }

    pub fn auto() -> Self {
        Self::new(SchemaBehavior::Auto)
    }

    pub fn dynamic() -> Self {
        Self::new(SchemaBehavior::Dynamic)
    }

    pub fn polymorphic() -> Self {
        Self::new(SchemaBehavior::Polymorphic)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Vet a write of `value` to `key`, where `existing` is the current
    /// value if the key is present. Returns the value to store.
    pub(crate) fn check(
        &self,
        key: &str,
        value: Value,
        existing: Option<&Value>,
        helpers: &HelperTable,
    ) -> Result<Value> {
        let value = match &self.transform {
            Some(transform) => transform.apply(value, helpers)?,
            None => value,
        };

        let Some(existing) = existing else {
            return match self.behavior {
                SchemaBehavior::Auto => Err(Error::ForbiddenProperty {
                    key: key.to_string(),
                }),
                SchemaBehavior::Dynamic | SchemaBehavior::Polymorphic => Ok(value),
            };
        };

        // Nothing to compare against yet.
        if existing.is_nullish() {
            return Ok(value);
        }

        let expected = existing.type_name();
        let found = value.type_name();
        if expected == found {
            return Ok(value);
        }

        match self.behavior {
            SchemaBehavior::Polymorphic => coerce(key, value, expected),
            SchemaBehavior::Auto | SchemaBehavior::Dynamic => Err(Error::SchemaMismatch {
                key: key.to_string(),
                expected,
                found,
            }),
        }
    }
}

fn coerce(key: &str, value: Value, expected: &'static str) -> Result<Value> {
    match expected {
        "number" => Ok(Value::Number(value.to_number())),
        "string" => Ok(Value::from(value.to_string())),
        "boolean" => Ok(Value::Bool(match value.as_str() {
            Some(text) => !matches!(text.trim(), "" | "false" | "0"),
            None => value.is_truthy(),
        })),
        _ => Err(Error::SchemaMismatch {
            key: key.to_string(),
            expected,
            found: value.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helpers() -> HelperTable {
        HelperTable::new()
    }

    #[test]
    fn auto_rejects_new_keys_and_type_changes() {
        let schema = Schema::auto();
        let existing = Value::from(1);

        let err = schema.check("n", Value::from("x"), Some(&existing), &helpers()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { expected: "number", found: "string", .. }));

        let err = schema.check("m", Value::from(1), None, &helpers()).unwrap_err();
        assert!(matches!(err, Error::ForbiddenProperty { key } if key == "m"));
    }

    #[test]
    fn dynamic_allows_new_keys() {
        let schema = Schema::dynamic();
        let value = schema.check("m", Value::from("x"), None, &helpers()).unwrap();
        assert_eq!(value.as_str(), Some("x"));
    }

    #[test]
    fn polymorphic_coerces_to_existing_type() {
        let schema = Schema::polymorphic();
        let number = Value::from(0);
        let flag = Value::from(true);

        let coerced = schema.check("n", Value::from("42"), Some(&number), &helpers()).unwrap();
        assert_eq!(coerced.as_f64(), Some(42.0));

        let coerced = schema.check("f", Value::from("false"), Some(&flag), &helpers()).unwrap();
        assert_eq!(coerced.as_bool(), Some(false));
    }

    #[test]
    fn transform_runs_before_type_rules() {
        let schema = Schema::auto().with_transform(Transform::func(|v| Value::Number(v.to_number())));
        let existing = Value::from(1);
        let value = schema.check("n", Value::from("7"), Some(&existing), &helpers()).unwrap();
        assert_eq!(value.as_f64(), Some(7.0));
    }

    #[test]
    fn null_existing_accepts_anything() {
        let schema = Schema::auto();
        let value = schema.check("n", Value::from("x"), Some(&Value::Null), &helpers()).unwrap();
        assert_eq!(value.as_str(), Some("x"));
    }
}
