//! Expression syntax tree.

use crate::value::Value;

/// Which per-evaluation input a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder {
    /// `_`: the current loop item.
    Item,
    /// `$event`: the event payload.
    Event,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Literal(Value),
    Path(String),
    /// `_`, `_.name`, `$event/target/value`. `path` is what follows the
    /// marker and may be empty.
    Placeholder { kind: Placeholder, path: String },
    /// `items...` or `items...price`.
    Explosion { base: String, prop: Option<String> },
    /// A helper call. Operators are desugared into calls of their helper.
    /// `source` is the text the call was parsed from, returned verbatim
    /// when the helper turns out not to exist.
    Call {
        callee: String,
        args: Vec<Expr>,
        source: String,
    },
}

impl Expr {
    /// Classify a bare word that is not followed by an argument list.
    pub(crate) fn from_word(word: &str) -> Expr {
        match word {
            "true" => return Expr::Literal(Value::Bool(true)),
            "false" => return Expr::Literal(Value::Bool(false)),
            "null" => return Expr::Literal(Value::Null),
            "undefined" => return Expr::Literal(Value::Undefined),
            _ => {}
        }

        if let Some((base, prop)) = word.split_once("...") {
            return Expr::Explosion {
                base: base.to_string(),
                prop: (!prop.is_empty()).then(|| prop.to_string()),
            };
        }

        for (marker, kind) in [("_", Placeholder::Item), ("$event", Placeholder::Event)] {
            if let Some(path) = placeholder_path(word, marker) {
                return Expr::Placeholder { kind, path };
            }
        }

        Expr::Path(word.to_string())
    }
}

fn placeholder_path(word: &str, marker: &str) -> Option<String> {
    let rest = word.strip_prefix(marker)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix('/'))
        .map(str::to_string)
}
