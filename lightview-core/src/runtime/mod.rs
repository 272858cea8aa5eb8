//! Reactive Runtime
//!
//! The runtime is the explicitly constructed owner of everything that is
//! shared between cells: the name registry, the state side table and proxy
//! cache, the helper and operator tables, the validation hook and the
//! configuration. Nothing here is a process-wide singleton; tests build a
//! fresh runtime or call [`Runtime::reset`].
//!
//! Dependency tracking itself is not owned by the runtime. It lives in a
//! thread-local stack (see [`ReactiveContext`](crate::reactive::ReactiveContext))
//! because it carries no state beyond "which effect is running right now".
//!
//! # Thread Safety
//!
//! A `Runtime` is a cheap `Arc` handle and may be shared across threads.
//! Effects run synchronously on the thread that triggered them.

mod options;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::cdomc;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::expr::{self, Evaluator, Expr, Fixity, HelperOptions, HelperTable, OperatorTable};
use crate::path::Resolver;
use crate::reactive::{load_stored, Computed, Effect, Signal, SignalOptions};
use crate::registry::{NamedCell, Registry, ScopeId};
use crate::state::{Raw, State, StateEnv, Validator};
use crate::value::Value;

pub use options::{GetOptions, StateOptions};

struct RuntimeInner {
    config: RuntimeConfig,
    registry: Arc<Registry>,
    env: Arc<StateEnv>,
    helpers: Arc<HelperTable>,
    operators: Arc<OperatorTable>,
    /// Parsed expressions by source text.
    expressions: DashMap<String, Arc<Expr>>,
}

/// Owner of the registry, state tables and expression machinery.
///
/// ```rust
/// use lightview_core::{Runtime, SignalOptions, Value};
///
/// let rt = Runtime::new();
/// let count = rt.signal(1, SignalOptions::named("count")).unwrap();
/// let label = rt.parse_expression("$/count + 1", Value::Undefined);
///
/// count.set(2);
/// assert_eq!(label.get().as_f64(), Some(3.0));
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let helpers = Arc::new(HelperTable::new());
        let operators = Arc::new(OperatorTable::new());
        if config.builtin_helpers {
            helpers.register_builtins();
            operators.register_defaults();
        }
        Self {
            inner: Arc::new(RuntimeInner {
                registry: Arc::new(Registry::new()),
                env: Arc::new(StateEnv::new(Arc::clone(&helpers))),
                helpers,
                operators,
                expressions: DashMap::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn helpers(&self) -> &HelperTable {
        &self.inner.helpers
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.inner.operators
    }

    /// Drop every name, state slot, helper, operator and cached expression,
    /// then restore the built-ins if the config asks for them.
    ///
    /// Cells created before the reset keep working; they are only no longer
    /// reachable by name.
    pub fn reset(&self) {
        let inner = &self.inner;
        inner.registry.clear();
        inner.env.clear();
        inner.helpers.clear();
        inner.operators.clear();
        inner.expressions.clear();
        if inner.config.builtin_helpers {
            inner.helpers.register_builtins();
            inner.operators.register_defaults();
        }
        debug!("runtime reset");
    }

    // ------------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------------

    /// Create a signal, registering it when `options` carries a name.
    pub fn signal(&self, init: impl Into<Value>, options: SignalOptions) -> Result<Signal> {
        let signal = Signal::with_options(init, &options);
        if let Some(name) = &options.name {
            self.inner
                .registry
                .register(name, NamedCell::Signal(signal.clone()), options.scope)?;
        }
        Ok(signal)
    }

    /// Look up a named signal.
    ///
    /// An unbound name yields a new signal registered with
    /// `options.default` when one is given, and otherwise a future: an
    /// `Undefined` signal that starts mirroring the name once something
    /// registers it.
    pub fn get_signal(&self, name: &str, options: GetOptions) -> Result<Signal> {
        match self.inner.registry.lookup(name, options.scope) {
            Some(NamedCell::Signal(signal)) => Ok(signal),
            Some(NamedCell::State(_)) => Err(Error::KindMismatch {
                name: name.to_string(),
                expected: "signal",
            }),
            None => match options.default {
                Some(value) => {
                    let signal_options = SignalOptions {
                        name: Some(name.to_string()),
                        scope: options.scope,
                        storage: None,
                    };
                    self.signal(value, signal_options)
                }
                None => Ok(self.inner.registry.future(name)),
            },
        }
    }

    /// Run `f` now and again whenever a signal it read changes.
    pub fn effect<F>(&self, f: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::with_rerun_limit(self.inner.config.max_effect_reruns, f)
    }

    pub fn computed<F, T>(&self, f: F) -> Computed
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Computed::with_rerun_limit(self.inner.config.max_effect_reruns, f)
    }

    /// Wrap an object, array or date in a [`State`].
    ///
    /// With a name and a storage backend, a stored document of the same
    /// shape replaces `value`, and every later write persists the tree.
    pub fn state(&self, value: impl Into<Value>, options: StateOptions) -> Result<State> {
        let value = value.into().to_raw();
        let Some(mut raw) = Raw::from_value(&value) else {
            return Err(Error::NotContainer {
                found: value.type_name(),
            });
        };

        match (&options.name, &options.storage) {
            (Some(name), Some(storage)) => {
                if let Some(stored) = load_stored(storage.as_ref(), name) {
                    match Raw::from_value(&stored) {
                        Some(loaded) if loaded.kind() == raw.kind() => raw = loaded,
                        _ => warn!(key = %name, "stored value has a different shape, keeping the initial one"),
                    }
                }
            }
            (None, Some(_)) => warn!("state storage ignored: persisted states need a name"),
            _ => {}
        }

        let state = self.inner.env.wrap_raw(raw);
        if let Some(schema) = options.schema {
            state.set_schema(Some(schema));
        }
        if let (Some(name), Some(storage)) = (&options.name, options.storage) {
            state.persist_to(storage, name.as_str());
        }
        state.set_scope(options.scope);

        if let Some(name) = &options.name {
            self.inner
                .registry
                .register(name, NamedCell::State(state.clone()), options.scope)?;
        }
        Ok(state)
    }

    /// Look up a named state. Unbound names behave as in
    /// [`Runtime::get_signal`]: a default creates the state, otherwise a
    /// future signal comes back.
    pub fn get_state(&self, name: &str, options: GetOptions) -> Result<NamedCell> {
        match self.inner.registry.lookup(name, options.scope) {
            Some(NamedCell::State(state)) => Ok(NamedCell::State(state)),
            Some(NamedCell::Signal(_)) => Err(Error::KindMismatch {
                name: name.to_string(),
                expected: "state",
            }),
            None => match options.default {
                Some(value) => {
                    let state_options = StateOptions {
                        name: Some(name.to_string()),
                        scope: options.scope,
                        ..StateOptions::default()
                    };
                    self.state(value, state_options).map(NamedCell::State)
                }
                None => Ok(NamedCell::Signal(self.inner.registry.future(name))),
            },
        }
    }

    /// Wrap containers in the state layer; other values pass through.
    pub fn wrap(&self, value: impl Into<Value>) -> Value {
        self.inner.env.wrap_value(value.into())
    }

    pub fn register(&self, name: &str, cell: impl Into<NamedCell>, scope: Option<ScopeId>) -> Result<()> {
        self.inner.registry.register(name, cell.into(), scope)
    }

    pub fn lookup(&self, name: &str, scope: Option<ScopeId>) -> Option<NamedCell> {
        self.inner.registry.lookup(name, scope)
    }

    /// Install the hook consulted on every state property write.
    pub fn set_validator<F>(&self, validator: F)
    where
        F: Fn(&str, &Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        let validator: Validator = Arc::new(validator);
        self.inner.env.set_validator(Some(validator));
    }

    pub fn clear_validator(&self) {
        self.inner.env.set_validator(None);
    }

    // ------------------------------------------------------------------------
    // Paths and expressions
    // ------------------------------------------------------------------------

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            registry: &self.inner.registry,
            literal_fallback: self.inner.config.literal_fallback,
            scope: None,
        }
    }

    /// Resolve a path to a plain value. See [`crate::path`] for the forms.
    pub fn resolve_path(&self, path: &str, context: &Value) -> Value {
        self.resolver().resolve(path, context)
    }

    /// Resolve a path to something writable: a binding for the last
    /// segment, or the named cell itself.
    pub fn resolve_path_as_context(&self, path: &str, context: &Value) -> Value {
        self.resolver().resolve_as_context(path, context)
    }

    fn evaluator(&self) -> Evaluator {
        Evaluator {
            registry: Arc::clone(&self.inner.registry),
            helpers: Arc::clone(&self.inner.helpers),
            operators: Arc::clone(&self.inner.operators),
            literal_fallback: self.inner.config.literal_fallback,
        }
    }

    fn parsed(&self, source: &str) -> Result<Arc<Expr>> {
        if let Some(expr) = self.inner.expressions.get(source) {
            return Ok(Arc::clone(expr.value()));
        }
        let expr = Arc::new(expr::parse(source, &self.inner.operators)?);
        let capacity = self.inner.config.expression_cache_size;
        if capacity == 0 {
            return Ok(expr);
        }
        if self.inner.expressions.len() >= capacity {
            debug!(capacity, "expression cache full, clearing");
            self.inner.expressions.clear();
        }
        self.inner
            .expressions
            .insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    /// Evaluate an expression once against `context`.
    ///
    /// Text that does not parse as an expression comes back as itself, and
    /// so does a call to a helper that is not registered. Errors raised by
    /// a helper are returned.
    pub fn resolve_expression(&self, expression: &str, context: &Value) -> Result<Value> {
        let expr = match self.parsed(expression) {
            Ok(expr) => expr,
            Err(e) => {
                debug!(expression = %expression, error = %e, "not an expression, using the text");
                return Ok(Value::from(expression));
            }
        };
        self.evaluator().evaluate(&expr, context)
    }

    /// A computed that re-evaluates `expression` whenever something it read
    /// changes. Helper errors are logged and yield `Undefined`.
    pub fn parse_expression(&self, expression: &str, context: Value) -> Computed {
        let runtime = self.clone();
        let expression = expression.to_string();
        self.computed(move || match runtime.resolve_expression(&expression, &context) {
            Ok(value) => value,
            Err(e) => {
                warn!(expression = %expression, error = %e, "expression failed");
                Value::Undefined
            }
        })
    }

    pub fn register_helper<F>(&self, name: &str, options: HelperOptions, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.inner.helpers.register(name, options, f);
    }

    /// Map an operator symbol onto a helper. Cached parses are dropped since
    /// the same text may now tokenize differently.
    pub fn register_operator(&self, helper: &str, symbol: &str, fixity: Fixity, precedence: u8) -> Result<()> {
        self.inner
            .operators
            .register(helper, symbol, fixity, precedence)?;
        self.inner.expressions.clear();
        Ok(())
    }

    pub fn parse_cdomc(&self, text: &str) -> Result<serde_json::Value> {
        cdomc::parse_cdomc(text)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("helpers", &self.inner.helpers)
            .field("operators", &self.inner.operators)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::MemoryStorage;
    use crate::reactive::Storage;
    use crate::state::Schema;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn named_signals_are_registered() {
        let rt = Runtime::new();
        let count = rt.signal(1, SignalOptions::named("count")).unwrap();
        let found = rt.get_signal("count", GetOptions::default()).unwrap();
        assert!(found.ptr_eq(&count));
    }

    #[test]
    fn get_signal_with_a_default_creates_it() {
        let rt = Runtime::new();
        let created = rt
            .get_signal("fresh", GetOptions::default().or_default(5))
            .unwrap();
        assert_eq!(created.get().as_f64(), Some(5.0));
        assert!(rt.lookup("fresh", None).is_some());
    }

    #[test]
    fn futures_mirror_late_registrations() {
        let rt = Runtime::new();
        let future = rt.get_signal("late", GetOptions::default()).unwrap();
        assert!(future.get().is_undefined());

        let late = rt.signal("here", SignalOptions::named("late")).unwrap();
        assert_eq!(future.get().as_str(), Some("here"));
        late.set("changed");
        assert_eq!(future.get().as_str(), Some("changed"));
    }

    #[test]
    fn kind_mismatch() {
        let rt = Runtime::new();
        rt.state(Value::object([("a", 1)]), StateOptions::named("doc"))
            .unwrap();
        let err = rt.get_signal("doc", GetOptions::default()).unwrap_err();
        assert!(matches!(err, Error::KindMismatch { expected: "signal", .. }));
    }

    #[test]
    fn state_rejects_primitives() {
        let rt = Runtime::new();
        let err = rt.state(3, StateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotContainer { found: "number" }));
    }

    #[test]
    fn persisted_state_round_trips() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set_item("prefs", r#"{"theme":"dark"}"#).unwrap();

        let rt = Runtime::new();
        let prefs = rt
            .state(
                Value::object([("theme", "light")]),
                StateOptions::named("prefs").persisted(storage.clone()),
            )
            .unwrap();
        assert_eq!(prefs.get("theme").as_str(), Some("dark"));

        prefs.set("theme", "solarized").unwrap();
        assert_eq!(
            storage.get_item("prefs").as_deref(),
            Some(r#"{"theme":"solarized"}"#)
        );
    }

    #[test]
    fn schema_from_options() {
        let rt = Runtime::new();
        let doc = rt
            .state(
                Value::from_json(&json!({ "age": 1 })),
                StateOptions::default().with_schema(Schema::auto()),
            )
            .unwrap();
        assert!(matches!(doc.set("extra", 1), Err(Error::ForbiddenProperty { .. })));
        assert!(matches!(doc.set("age", "old"), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn validator_vetoes_writes() {
        let rt = Runtime::new();
        rt.set_validator(|key, value| {
            if key == "age" && value.to_number() < 0.0 {
                Err("must not be negative".into())
            } else {
                Ok(())
            }
        });
        let doc = rt.state(Value::object([("age", 1)]), StateOptions::default()).unwrap();
        assert!(matches!(doc.set("age", -1), Err(Error::Validation { .. })));

        rt.clear_validator();
        doc.set("age", -1).unwrap();
    }

    #[test]
    fn expressions_against_a_context() {
        let rt = Runtime::new();
        let ctx = Value::from_json(&json!({ "price": 4, "qty": 3 }));
        assert_eq!(rt.resolve_expression("mul(price, qty)", &ctx).unwrap().as_f64(), Some(12.0));
        assert_eq!(rt.resolve_expression("price * qty", &ctx).unwrap().as_f64(), Some(12.0));
        assert_eq!(
            rt.resolve_expression("just some words", &ctx).unwrap().as_str(),
            Some("just some words")
        );
    }

    #[test]
    fn event_placeholders_resolve_against_the_event() {
        let rt = Runtime::new();
        let form = rt
            .state(Value::object([("name", "")]), StateOptions::named("form"))
            .unwrap();
        let handler = rt
            .resolve_expression("set($/form/name, $event/target/value)", &Value::Undefined)
            .unwrap();
        let Value::Lazy(handler) = handler else {
            panic!("expected a lazy handler");
        };
        assert_eq!(form.get("name").as_str(), Some(""));

        let event = Value::from_json(&json!({ "target": { "value": "Ada" } }));
        handler.resolve_event(&event).unwrap();
        assert_eq!(form.get("name").as_str(), Some("Ada"));
    }

    #[test]
    fn parsed_expressions_recompute() {
        let rt = Runtime::new();
        let count = rt.signal(1, SignalOptions::named("count")).unwrap();
        let doubled = rt.parse_expression("$/mul($/count, 2)", Value::Undefined);
        assert_eq!(doubled.get().as_f64(), Some(2.0));
        count.set(4);
        assert_eq!(doubled.get().as_f64(), Some(8.0));

        doubled.stop();
        count.set(5);
        assert_eq!(doubled.get().as_f64(), Some(8.0));
    }

    #[test]
    fn custom_helpers_and_operators() {
        let rt = Runtime::new();
        rt.register_helper("shout", HelperOptions::default(), |args| {
            let text = args.first().map(Value::unwrap_cell).unwrap_or_default();
            Ok(Value::from(text.to_string().to_uppercase()))
        });
        rt.register_operator("pow", "**", Fixity::Infix, 7).unwrap();

        let ctx = Value::Undefined;
        assert_eq!(rt.resolve_expression("shout('hi')", &ctx).unwrap().as_str(), Some("HI"));
        assert_eq!(rt.resolve_expression("2 ** 3", &ctx).unwrap().as_f64(), Some(8.0));
    }

    #[test]
    fn registering_an_operator_drops_stale_parses() {
        let rt = Runtime::new();
        let ctx = Value::Undefined;
        // `~` is not an operator yet, so the text does not parse.
        assert_eq!(rt.resolve_expression("~1", &ctx).unwrap().as_str(), Some("~1"));
        rt.register_operator("not", "~", Fixity::Prefix, 7).unwrap();
        assert_eq!(rt.resolve_expression("~1", &ctx).unwrap().as_bool(), Some(false));
    }

    #[test]
    fn expression_cache_is_bounded() {
        let rt = Runtime::with_config(RuntimeConfig {
            expression_cache_size: 4,
            ..RuntimeConfig::default()
        });
        for n in 0..10 {
            let source = format!("add({n}, 1)");
            let value = rt.resolve_expression(&source, &Value::Undefined).unwrap();
            assert_eq!(value.as_f64(), Some(f64::from(n) + 1.0));
            assert!(rt.inner.expressions.len() <= 4);
        }

        let uncached = Runtime::with_config(RuntimeConfig {
            expression_cache_size: 0,
            ..RuntimeConfig::default()
        });
        uncached.resolve_expression("add(1, 2)", &Value::Undefined).unwrap();
        assert!(uncached.inner.expressions.is_empty());
    }

    #[test]
    fn reset_clears_names_and_custom_helpers() {
        let rt = Runtime::new();
        rt.signal(1, SignalOptions::named("count")).unwrap();
        rt.register_helper("custom", HelperOptions::default(), |_| Ok(Value::Null));

        rt.reset();
        assert!(rt.lookup("count", None).is_none());
        assert!(!rt.helpers().contains("custom"));
        assert!(rt.helpers().contains("add"));

        // The name is free again.
        rt.signal(2, SignalOptions::named("count")).unwrap();
    }

    #[test]
    fn effects_respect_the_configured_rerun_limit() {
        let rt = Runtime::with_config(RuntimeConfig {
            max_effect_reruns: 3,
            ..RuntimeConfig::default()
        });
        let n = rt.signal(0, SignalOptions::default()).unwrap();
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let n_clone = n.clone();
        let _effect = rt.effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            let value = n_clone.get().to_number();
            n_clone.set(value + 1.0);
        });

        // The first run plus at most three queued re-runs.
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn scoped_names_shadow_global_ones() {
        let rt = Runtime::new();
        let outer = ScopeId::new();
        let inner = ScopeId::new();
        rt.registry().set_scope_parent(inner, outer);

        rt.signal("global", SignalOptions::named("label")).unwrap();
        rt.signal("outer", SignalOptions::named("label").in_scope(outer))
            .unwrap();

        let found = rt.get_signal("label", GetOptions::in_scope(inner)).unwrap();
        assert_eq!(found.get().as_str(), Some("outer"));
        let found = rt.get_signal("label", GetOptions::default()).unwrap();
        assert_eq!(found.get().as_str(), Some("global"));
    }
}
