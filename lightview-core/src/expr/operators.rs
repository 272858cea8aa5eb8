//! Operator symbols mapped onto helpers.

use std::fmt;

use dashmap::DashMap;

use crate::error::{Error, Result};

/// Where an operator sits relative to its operand(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixity {
    Prefix,
    Postfix,
    Infix,
}

/// One registered operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDef {
    pub symbol: String,
    pub helper: String,
    pub fixity: Fixity,
    /// Higher binds tighter. Infix operators are left-associative.
    pub precedence: u8,
}

/// Characters an operator symbol may be built from. Keeping symbols out of
/// the path alphabet is what lets the tokenizer tell them apart.
const OPERATOR_CHARS: &str = "+-*/%=!<>&|^~?:@#";

fn valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| OPERATOR_CHARS.contains(c))
}

/// Symbol and fixity to operator map.
#[derive(Default)]
pub struct OperatorTable {
    ops: DashMap<(String, Fixity), OperatorDef>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the default operators.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        table.register_defaults();
        table
    }

    pub fn register_defaults(&self) {
        const DEFAULTS: &[(&str, &str, Fixity, u8)] = &[
            ("or", "||", Fixity::Infix, 1),
            ("and", "&&", Fixity::Infix, 2),
            ("eq", "==", Fixity::Infix, 3),
            ("neq", "!=", Fixity::Infix, 3),
            ("gt", ">", Fixity::Infix, 4),
            ("gte", ">=", Fixity::Infix, 4),
            ("lt", "<", Fixity::Infix, 4),
            ("lte", "<=", Fixity::Infix, 4),
            ("add", "+", Fixity::Infix, 5),
            ("sub", "-", Fixity::Infix, 5),
            ("mul", "*", Fixity::Infix, 6),
            ("div", "/", Fixity::Infix, 6),
            ("mod", "%", Fixity::Infix, 6),
            ("not", "!", Fixity::Prefix, 7),
            ("increment", "++", Fixity::Prefix, 7),
            ("decrement", "--", Fixity::Prefix, 7),
            ("increment", "++", Fixity::Postfix, 8),
            ("decrement", "--", Fixity::Postfix, 8),
        ];
        for &(helper, symbol, fixity, precedence) in DEFAULTS {
            self.ops.insert(
                (symbol.to_string(), fixity),
                OperatorDef {
                    symbol: symbol.to_string(),
                    helper: helper.to_string(),
                    fixity,
                    precedence,
                },
            );
        }
    }

    /// Map `symbol` in `fixity` position to the helper `helper`.
    pub fn register(&self, helper: &str, symbol: &str, fixity: Fixity, precedence: u8) -> Result<()> {
        if !valid_symbol(symbol) {
            return Err(Error::InvalidOperator(symbol.to_string()));
        }
        self.ops.insert(
            (symbol.to_string(), fixity),
            OperatorDef {
                symbol: symbol.to_string(),
                helper: helper.to_string(),
                fixity,
                precedence,
            },
        );
        Ok(())
    }

    pub fn get(&self, symbol: &str, fixity: Fixity) -> Option<OperatorDef> {
        self.ops
            .get(&(symbol.to_string(), fixity))
            .map(|entry| entry.value().clone())
    }

    /// The helper a bare symbol stands for when used as a callee, as in
    /// `/(6, 2)`. Infix meanings win.
    pub fn helper_for(&self, symbol: &str) -> Option<String> {
        [Fixity::Infix, Fixity::Prefix, Fixity::Postfix]
            .into_iter()
            .find_map(|fixity| self.get(symbol, fixity))
            .map(|def| def.helper)
    }

    /// Every distinct symbol, longest first, for maximal-munch tokenizing.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.ops.iter().map(|entry| entry.key().0.clone()).collect();
        symbols.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        symbols.dedup();
        symbols
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&self) {
        self.ops.clear();
    }
}

impl fmt::Debug for OperatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorTable")
            .field("operators", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_increment_positions() {
        let table = OperatorTable::with_defaults();
        assert_eq!(table.get("++", Fixity::Prefix).unwrap().helper, "increment");
        assert_eq!(table.get("++", Fixity::Postfix).unwrap().precedence, 8);
        assert!(table.get("++", Fixity::Infix).is_none());
    }

    #[test]
    fn symbols_are_longest_first() {
        let table = OperatorTable::with_defaults();
        let symbols = table.symbols();
        let pos = |s: &str| symbols.iter().position(|x| x == s).unwrap();
        assert!(pos(">=") < pos(">"));
        assert!(pos("++") < pos("+"));
        assert_eq!(symbols.iter().filter(|s| *s == "++").count(), 1);
    }

    #[test]
    fn word_symbols_are_rejected() {
        let table = OperatorTable::new();
        let err = table.register("and", "and", Fixity::Infix, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidOperator(s) if s == "and"));
        table.register("pow", "**", Fixity::Infix, 7).unwrap();
        assert_eq!(table.helper_for("**").as_deref(), Some("pow"));
    }
}
