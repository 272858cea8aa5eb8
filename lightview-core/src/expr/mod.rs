//! Expressions
//!
//! The expression language drives helpers and paths from strings found in
//! markup:
//!
//! ```text
//! $/count                       read a registered signal
//! $/add($/price, 5)             call a helper
//! $/cart/items...price          every item's price, spread into the call
//! filter($/todos, not(_.done))  `_` is the item, supplied per element
//! ++$/count                     operators map onto helpers
//! ```
//!
//! Text is tokenized, parsed into an [`Expr`](ast::Expr) tree by a Pratt
//! parser driven by the [`OperatorTable`], and then evaluated. Parsing and
//! evaluation are separate passes, so a parsed tree can be cached and
//! evaluated many times.

mod ast;
mod eval;
mod helpers;
mod lazy;
mod operators;
mod parser;
mod token;

pub use helpers::{Helper, HelperFn, HelperOptions, HelperTable};
pub use lazy::LazyValue;
pub use operators::{Fixity, OperatorDef, OperatorTable};

pub(crate) use ast::Expr;
pub(crate) use eval::Evaluator;
pub(crate) use parser::parse;
