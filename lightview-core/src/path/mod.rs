//! Path Resolution
//!
//! Paths are strings that point into the registry or into a context value.
//! The forms, checked in this order:
//!
//! | Form            | Meaning                                             |
//! |-----------------|-----------------------------------------------------|
//! | `.`             | the context itself                                  |
//! | `$/name/a/b`    | `name` from the registry, then `a`, then `b`        |
//! | `./a/b`         | `a`, then `b`, from the context                     |
//! | `../a`          | `a` from the context's parent                       |
//! | `a/b`, `a.b`    | relative, same as `./a/b`                           |
//! | `a`             | the context's own `a` if defined, else the text `a` |
//!
//! Segments are separated by `/` or `.`; a segment written as `[...]` is
//! taken literally, so `$/files/[report.pdf]` has two segments.
//!
//! Cells met along the way are read through; hitting `null` or `undefined`
//! before the last segment yields `Undefined`. Reading a [`State`] property
//! is a tracked read, so resolving a path inside an effect subscribes the
//! effect to every step of the path.
//!
//! [`State`]: crate::state::State

mod binding;

use crate::registry::{Registry, ScopeId};
use crate::value::Value;

pub use binding::BindingTarget;
pub(crate) use binding::read_key;

/// Split a path body into segments.
pub(crate) fn segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                let literal: String = chars.by_ref().take_while(|&c| c != ']').collect();
                out.push(strip_quotes(&literal).to_string());
            }
            '/' | '.' => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn strip_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

/// Whether a value can be indexed by a path segment.
fn is_indexable(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_) | Value::State(_))
}

/// Everything path resolution needs from the runtime.
pub(crate) struct Resolver<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) literal_fallback: bool,
    pub(crate) scope: Option<ScopeId>,
}

enum Start<'p> {
    Value(Value),
    Traverse(Value, Vec<String>),
    Bare(&'p str),
}

impl<'a> Resolver<'a> {
    /// Resolve `path` against `context` to a plain value.
    pub(crate) fn resolve(&self, path: &str, context: &Value) -> Value {
        match self.start(path, context) {
            Start::Value(value) => value.unwrap_cell(),
            Start::Traverse(base, segs) => match self.walk(base, &segs) {
                Some(value) => value.unwrap_cell(),
                None => Value::Undefined,
            },
            Start::Bare(name) => {
                let base = context.unwrap_cell();
                let own = read_key(&base, name);
                if !own.is_undefined() {
                    own.unwrap_cell()
                } else {
                    self.fallback(name)
                }
            }
        }
    }

    /// Resolve `path` but stop short of reading the last segment, returning
    /// a [`BindingTarget`] for it. Paths that name a cell directly return
    /// the cell, wrapper kept.
    pub(crate) fn resolve_as_context(&self, path: &str, context: &Value) -> Value {
        match self.start(path, context) {
            Start::Value(value) => value,
            Start::Traverse(base, segs) => {
                let Some((last, init)) = segs.split_last() else {
                    return base;
                };
                match self.walk(base, init) {
                    Some(container) => bind(container.unwrap_cell(), last),
                    None => Value::Undefined,
                }
            }
            Start::Bare(name) => {
                let base = context.unwrap_cell();
                if is_indexable(&base) {
                    Value::Binding(BindingTarget::new(base, name))
                } else {
                    self.fallback(name)
                }
            }
        }
    }

    fn start<'p>(&self, path: &'p str, context: &Value) -> Start<'p> {
        let path = path.trim();

        if path == "." {
            return Start::Value(context.clone());
        }

        if let Some(rest) = path.strip_prefix("$/") {
            let segs = segments(rest);
            let Some((name, tail)) = segs.split_first() else {
                return Start::Value(Value::Undefined);
            };
            let scope = self.scope.or_else(|| scope_of(context));
            return match self.registry.lookup(name, scope) {
                Some(cell) if tail.is_empty() => Start::Value(cell.to_value()),
                Some(cell) => Start::Traverse(cell.to_value(), tail.to_vec()),
                None => Start::Value(Value::Undefined),
            };
        }

        if let Some(rest) = path.strip_prefix("./") {
            return Start::Traverse(context.clone(), segments(rest));
        }

        if path.starts_with("../") {
            let mut rest = path;
            let mut base = context.clone();
            while let Some(stripped) = rest.strip_prefix("../") {
                base = parent_of(&base);
                rest = stripped;
            }
            if base.is_undefined() {
                return Start::Value(Value::Undefined);
            }
            return Start::Traverse(base, segments(rest));
        }

        if path.contains('/') || path.contains('.') || path.starts_with('[') {
            return Start::Traverse(context.clone(), segments(path));
        }

        Start::Bare(path)
    }

    /// Index through `segs`, unwrapping cells before each step. `None` means
    /// the walk hit `null` or `undefined` before a step.
    fn walk(&self, base: Value, segs: &[String]) -> Option<Value> {
        let mut current = base;
        for seg in segs {
            let container = current.unwrap_cell();
            if container.is_nullish() {
                return None;
            }
            current = read_key(&container, seg);
        }
        Some(current)
    }

    fn fallback(&self, name: &str) -> Value {
        if self.literal_fallback {
            Value::from(name)
        } else {
            Value::Undefined
        }
    }
}

fn bind(container: Value, key: &str) -> Value {
    if is_indexable(&container) {
        Value::Binding(BindingTarget::new(container, key))
    } else {
        Value::Undefined
    }
}

pub(crate) fn scope_of(context: &Value) -> Option<ScopeId> {
    match context {
        Value::State(state) => state.scope(),
        Value::Binding(binding) => scope_of(binding.container()),
        _ => None,
    }
}

/// The value one level up from `context`: a state's parent, or the
/// container a binding points into.
fn parent_of(context: &Value) -> Value {
    match context {
        Value::Binding(binding) => binding.container().clone(),
        Value::State(state) => state.parent().map_or(Value::Undefined, Value::State),
        Value::Signal(signal) => parent_of(&signal.get()),
        _ => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::HelperTable;
    use crate::reactive::{Effect, Signal};
    use crate::registry::NamedCell;
    use crate::state::StateEnv;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    struct Fixture {
        registry: Registry,
        env: Arc<StateEnv>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Registry::new(),
                env: Arc::new(StateEnv::new(Arc::new(HelperTable::new()))),
            }
        }

        fn resolver(&self) -> Resolver<'_> {
            Resolver {
                registry: &self.registry,
                literal_fallback: true,
                scope: None,
            }
        }

        fn state(&self, name: &str, json: serde_json::Value) -> Value {
            let value = self.env.wrap_value(Value::from_json(&json));
            if let Value::State(state) = &value {
                self.registry
                    .register(name, NamedCell::State(state.clone()), None)
                    .unwrap();
            }
            value
        }
    }

    #[test]
    fn segments_split_on_both_delimiters() {
        assert_eq!(segments("a/b.c"), vec!["a", "b", "c"]);
        assert_eq!(segments("files/[report.pdf]/size"), vec!["files", "report.pdf", "size"]);
        assert_eq!(segments("list[0]"), vec!["list", "0"]);
        assert_eq!(segments("['a/b']"), vec!["a/b"]);
    }

    #[test]
    fn relative_paths_walk_raw_contexts() {
        let fx = Fixture::new();
        let ctx = Value::from_json(&json!({ "a": { "b": 5 } }));
        assert_eq!(fx.resolver().resolve("./a/b", &ctx).as_f64(), Some(5.0));
        assert_eq!(fx.resolver().resolve("a.b", &ctx).as_f64(), Some(5.0));
    }

    #[test]
    fn as_context_returns_a_binding() {
        let fx = Fixture::new();
        let ctx = Value::from_json(&json!({ "a": { "b": 5 } }));
        let Value::Binding(binding) = fx.resolver().resolve_as_context("./a", &ctx) else {
            panic!("expected a binding");
        };
        assert_eq!(binding.key(), "a");
        assert_eq!(binding.value().to_json(), json!({ "b": 5 }));
    }

    #[test]
    fn missing_segments_short_circuit() {
        let fx = Fixture::new();
        let ctx = Value::from_json(&json!({ "a": null }));
        assert!(fx.resolver().resolve("./a/b/c", &ctx).is_undefined());
        assert!(fx.resolver().resolve("./a", &ctx).is_nullish());
    }

    #[test]
    fn bare_names_fall_back_to_text() {
        let fx = Fixture::new();
        let ctx = Value::from_json(&json!({ "name": "Ada" }));
        assert_eq!(fx.resolver().resolve("name", &ctx).as_str(), Some("Ada"));
        assert_eq!(fx.resolver().resolve("hello", &ctx).as_str(), Some("hello"));

        let strict = Resolver {
            literal_fallback: false,
            ..fx.resolver()
        };
        assert!(strict.resolve("hello", &ctx).is_undefined());
    }

    #[test]
    fn absolute_paths_read_the_registry() {
        let fx = Fixture::new();
        let count = Signal::new(3);
        fx.registry
            .register("count", NamedCell::Signal(count.clone()), None)
            .unwrap();
        fx.state("user", json!({ "profile": { "name": "Ada" } }));

        let r = fx.resolver();
        assert_eq!(r.resolve("$/count", &Value::Undefined).as_f64(), Some(3.0));
        assert_eq!(
            r.resolve("$/user/profile/name", &Value::Undefined).as_str(),
            Some("Ada")
        );
        assert!(r.resolve("$/nobody/x", &Value::Undefined).is_undefined());
        assert!(matches!(
            r.resolve_as_context("$/count", &Value::Undefined),
            Value::Signal(_)
        ));
    }

    #[test]
    fn absolute_reads_are_tracked() {
        let fx = Fixture::new();
        let Value::State(user) = fx.state("user", json!({ "name": "Ada" })) else {
            panic!("expected state");
        };
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let registry = Arc::new(fx);
        let registry_clone = registry.clone();
        let _effect = Effect::new(move || {
            registry_clone.resolver().resolve("$/user/name", &Value::Undefined);
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        user.set("name", "Grace").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parent_paths_climb_state_links() {
        let fx = Fixture::new();
        let Value::State(root) = fx.state("root", json!({ "title": "T", "child": { "x": 1 } }))
        else {
            panic!("expected state");
        };
        let child = root.get("child");
        let r = fx.resolver();
        assert_eq!(r.resolve("../title", &child).as_str(), Some("T"));
        assert!(r.resolve("../../title", &child).is_undefined());
    }

    #[test]
    fn binding_writes_reach_state() {
        let fx = Fixture::new();
        let Value::State(user) = fx.state("user", json!({ "age": 30 })) else {
            panic!("expected state");
        };
        let Value::Binding(binding) = fx.resolver().resolve_as_context("$/user/age", &Value::Undefined)
        else {
            panic!("expected a binding");
        };
        binding.set_value(31).unwrap();
        assert_eq!(user.get("age").as_f64(), Some(31.0));
    }

    #[test]
    fn dot_is_the_context() {
        let fx = Fixture::new();
        let ctx = Value::from(7);
        assert_eq!(fx.resolver().resolve(".", &ctx).as_f64(), Some(7.0));
    }
}
