//! Expression evaluation.
//!
//! Evaluation is a walk over the [`Expr`] tree. Reads go through path
//! resolution, so evaluating inside an effect subscribes the effect to
//! everything the expression touched.
//!
//! A call whose arguments include a placeholder cannot run yet: it becomes
//! a [`LazyValue`] that re-evaluates the call once an item or event is
//! supplied. Helpers flagged `lazy_aware` are the exception for their
//! per-item arguments, which they receive as they are. Their first
//! argument is the collection, and a lazy collection still defers the call.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::warn;

use super::ast::{Expr, Placeholder};
use super::helpers::{Helper, HelperTable};
use super::lazy::LazyValue;
use super::operators::OperatorTable;
use crate::error::Result;
use crate::path::{read_key, scope_of, segments, Resolver};
use crate::registry::Registry;
use crate::state::StateKind;
use crate::value::Value;

/// Everything evaluation needs from the runtime, cheap to clone into lazy
/// values.
#[derive(Clone)]
pub(crate) struct Evaluator {
    pub(crate) registry: Arc<Registry>,
    pub(crate) helpers: Arc<HelperTable>,
    pub(crate) operators: Arc<OperatorTable>,
    pub(crate) literal_fallback: bool,
}

#[derive(Clone, Copy)]
struct Frame<'a> {
    context: &'a Value,
    /// What `_` stands for.
    item: Option<&'a Value>,
    /// What `$event` stands for.
    event: Option<&'a Value>,
    /// Set once a call was reached through `$/`: bare names that are
    /// registered resolve from the registry.
    global: bool,
}

impl Evaluator {
    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            registry: &self.registry,
            literal_fallback: self.literal_fallback,
            scope: None,
        }
    }

    /// Evaluate `expr` against `context`. Placeholders come back lazy.
    pub(crate) fn evaluate(&self, expr: &Expr, context: &Value) -> Result<Value> {
        self.eval(
            expr,
            Frame {
                context,
                item: None,
                event: None,
                global: false,
            },
        )
    }

    fn eval(&self, expr: &Expr, frame: Frame<'_>) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => Ok(self
                .resolver()
                .resolve(&self.normalize(path, frame), frame.context)),
            Expr::Placeholder { kind, path } => Ok(self.placeholder(*kind, path, frame, false)),
            Expr::Explosion { base, prop } => {
                Ok(Value::from(self.explode(base, prop.as_deref(), frame)?))
            }
            Expr::Call {
                callee,
                args,
                source,
            } => self.call(expr, callee, args, source, frame),
        }
    }

    fn call(
        &self,
        call: &Expr,
        callee: &str,
        args: &[Expr],
        source: &str,
        outer: Frame<'_>,
    ) -> Result<Value> {
        let (nav, name) = split_callee(callee);
        let global = outer.global || nav.starts_with('$');

        let Some(helper) = self.helper(name) else {
            warn!(helper = %name, expression = %source, "unknown helper, expression left unresolved");
            return Ok(Value::from(source));
        };

        let scoped = Frame { global, ..outer };
        let target = nav_path(nav).map(|path| {
            self.resolver()
                .resolve(&self.normalize(path, scoped), outer.context)
        });
        let frame = Frame {
            context: target.as_ref().unwrap_or(outer.context),
            ..scoped
        };

        let options = helper.options();
        let mut values = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            match arg {
                Expr::Explosion { base, prop } => {
                    values.extend(self.explode(base, prop.as_deref(), frame)?)
                }
                _ if index == 0 && options.path_aware => values.push(self.target(arg, frame)?),
                _ => values.push(self.eval(arg, frame)?),
            }
        }

        let deferred = values
            .iter()
            .enumerate()
            .any(|(index, v)| matches!(v, Value::Lazy(_)) && !(options.lazy_aware && index > 0));
        if deferred {
            return Ok(self.defer(call, outer));
        }

        Ok(helper.call(&values)?.unwrap_cell())
    }

    /// A lazy value re-evaluating `call` once its inputs are known. Inputs
    /// already present in `frame` are kept.
    fn defer(&self, call: &Expr, frame: Frame<'_>) -> Value {
        let this = self.clone();
        let call = call.clone();
        let context = frame.context.clone();
        let known_item = frame.item.cloned();
        let known_event = frame.event.cloned();
        let global = frame.global;
        Value::Lazy(LazyValue::with_inputs(move |item, event| {
            this.eval(
                &call,
                Frame {
                    context: &context,
                    item: item.or(known_item.as_ref()),
                    event: event.or(known_event.as_ref()),
                    global,
                },
            )
        }))
    }

    /// A helper by name, falling back to the helper an operator symbol
    /// stands for.
    fn helper(&self, name: &str) -> Option<Helper> {
        self.helpers.get(name).or_else(|| {
            self.operators
                .helper_for(name)
                .and_then(|helper| self.helpers.get(&helper))
        })
    }

    /// The first argument of a path-aware helper: resolved up to the last
    /// segment so the helper can write through it.
    fn target(&self, arg: &Expr, frame: Frame<'_>) -> Result<Value> {
        match arg {
            Expr::Path(path) => Ok(self
                .resolver()
                .resolve_as_context(&self.normalize(path, frame), frame.context)),
            Expr::Placeholder { kind, path } => Ok(self.placeholder(*kind, path, frame, true)),
            other => self.eval(other, frame),
        }
    }

    fn placeholder(&self, kind: Placeholder, path: &str, frame: Frame<'_>, as_context: bool) -> Value {
        let input = match kind {
            Placeholder::Item => frame.item,
            Placeholder::Event => frame.event,
        };
        if let Some(input) = input {
            return self.input_path(path, input, as_context);
        }
        let this = self.clone();
        let path = path.to_string();
        Value::Lazy(LazyValue::with_inputs(move |item, event| {
            let frame = Frame {
                context: &Value::Undefined,
                item,
                event,
                global: false,
            };
            Ok(this.placeholder(kind, &path, frame, as_context))
        }))
    }

    /// `path` read relative to an item or event.
    fn input_path(&self, path: &str, input: &Value, as_context: bool) -> Value {
        if path.is_empty() {
            return if as_context { input.clone() } else { input.unwrap_cell() };
        }
        let relative = format!("./{path}");
        if as_context {
            self.resolver().resolve_as_context(&relative, input)
        } else {
            self.resolver().resolve(&relative, input)
        }
    }

    /// `base...prop`: the elements of `base`, each mapped through `prop`
    /// when given. A non-array base yields its single `prop`.
    fn explode(&self, base: &str, prop: Option<&str>, frame: Frame<'_>) -> Result<Vec<Value>> {
        let container = self
            .resolver()
            .resolve(&self.normalize(base, frame), frame.context);
        let pick = |item: &Value| {
            let item = item.unwrap_cell();
            match prop {
                Some(prop) => read_key(&item, prop).unwrap_cell(),
                None => item,
            }
        };

        let items = match &container {
            Value::State(state) if state.kind() == StateKind::Array => state.items()?,
            Value::Array(arr) => arr.to_vec(),
            nullish if nullish.is_nullish() => return Ok(Vec::new()),
            single => return Ok(vec![pick(single)]),
        };
        Ok(items.iter().map(pick).collect())
    }

    /// In global mode a bare or relative path whose first segment is a
    /// registered name is read from the registry.
    fn normalize<'p>(&self, path: &'p str, frame: Frame<'_>) -> Cow<'p, str> {
        if !frame.global || path.starts_with(['$', '.', '[']) {
            return Cow::Borrowed(path);
        }
        let registered = segments(path)
            .first()
            .is_some_and(|root| self.registry.lookup(root, scope_of(frame.context)).is_some());
        if registered {
            Cow::Owned(format!("$/{path}"))
        } else {
            Cow::Borrowed(path)
        }
    }
}

/// Split a callee into its navigation prefix and helper name:
/// `$/user/save` is (`$/user`, `save`), `$/add` is (`$`, `add`), and a
/// trailing slash names the division helper, as in `$//`.
fn split_callee(callee: &str) -> (&str, &str) {
    if callee.len() > 1 {
        if let Some(slash) = callee.rfind('/') {
            let name = &callee[slash + 1..];
            if name.is_empty() {
                return (&callee[..slash], "/");
            }
            return (&callee[..slash], name.strip_prefix('$').unwrap_or(name));
        }
    }
    ("", callee.strip_prefix('$').unwrap_or(callee))
}

fn nav_path(nav: &str) -> Option<&str> {
    match nav.trim_end_matches('/') {
        "" | "$" => None,
        path => Some(path),
    }
}
