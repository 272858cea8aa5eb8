//! Lightview Core
//!
//! This crate provides the reactive core of the Lightview UI library. It
//! implements:
//!
//! - Reactive primitives (signals, effects, computed values)
//! - Deep-reactive state over nested objects, arrays and dates
//! - Path resolution against a name registry or a context value
//! - The JPRX/cDOM expression language and its helper library
//! - cDOMC, a relaxed JSON dialect for hand-written markup
//!
//! Rendering is not part of this crate. A renderer consumes it through two
//! contracts: "create a named reactive cell" and "read or write a path
//! against a context, tracking the read in the running effect".
//!
//! # Architecture
//!
//! - `reactive`: signals, effects, computed values and dependency tracking
//! - `state`: the deep-reactive wrapper and its side table
//! - `registry`: named cells, scopes and futures
//! - `path`: path resolution and binding targets
//! - `expr`: tokenizer, parser, evaluator, helpers and operators
//! - `cdomc`: the cDOMC parser
//! - `runtime`: the [`Runtime`] that owns all shared tables
//!
//! # Example
//!
//! ```rust
//! use lightview_core::{Runtime, SignalOptions, StateOptions, Value};
//! use serde_json::json;
//!
//! let rt = Runtime::new();
//!
//! // A named signal and a named state
//! let count = rt.signal(1, SignalOptions::named("count")).unwrap();
//! let cart = rt
//!     .state(
//!         Value::from_json(&json!({ "items": [{ "price": 3 }, { "price": 4 }] })),
//!         StateOptions::named("cart"),
//!     )
//!     .unwrap();
//!
//! // Expressions recompute when anything they read changes
//! let total = rt.parse_expression("$/sum($/cart/items...price)", Value::Undefined);
//! let next = rt.parse_expression("$/count + 1", Value::Undefined);
//! assert_eq!(total.get().as_f64(), Some(7.0));
//! assert_eq!(next.get().as_f64(), Some(2.0));
//!
//! let Value::State(items) = cart.get("items") else { unreachable!() };
//! items.push(Value::object([("price", 10)])).unwrap();
//! count.set(5);
//! assert_eq!(total.get().as_f64(), Some(17.0));
//! assert_eq!(next.get().as_f64(), Some(6.0));
//! ```

pub mod cdomc;
pub mod config;
pub mod error;
pub mod expr;
pub mod path;
pub mod reactive;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod value;

pub use cdomc::parse_cdomc;
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use expr::{Fixity, HelperOptions, LazyValue};
pub use path::BindingTarget;
pub use reactive::{untracked, Computed, Effect, MemoryStorage, Signal, SignalOptions, Storage};
pub use registry::{NamedCell, ScopeId};
pub use runtime::{GetOptions, Runtime, StateOptions};
pub use state::{Schema, SchemaBehavior, State, StateKind};
pub use value::Value;
