//! Error types for the reactive core.
//!
//! Only structural failures surface as errors: naming collisions, schema
//! violations, malformed cDOMC text. Data that simply has not resolved yet
//! (a missing path segment, an unknown helper) degrades to `Undefined` or to
//! literal text and is never reported here.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the reactive core.
#[derive(Debug, Error)]
pub enum Error {
    /// A different cell is already bound to this name in the same scope.
    #[error("name `{name}` is already bound to a different reactive cell")]
    NameCollision { name: String },

    /// The name is bound, but to the other kind of cell.
    #[error("name `{name}` is not bound to a {expected}")]
    KindMismatch { name: String, expected: &'static str },

    /// A write did not match the type the schema expects.
    #[error("property `{key}` expects a {expected}, got a {found}")]
    SchemaMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The schema does not allow adding this property.
    #[error("property `{key}` cannot be added to a state with an `auto` schema")]
    ForbiddenProperty { key: String },

    /// The validation hook rejected a write.
    #[error("validation failed for `{key}`: {message}")]
    Validation { key: String, message: String },

    /// `state()` was handed something that is not an object, array or date.
    #[error("cannot create reactive state from a {found}")]
    NotContainer { found: &'static str },

    /// A collection method called on the wrong kind of state.
    #[error("`{operation}` is not supported on {kind} state")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },

    /// Malformed cDOMC or expression text.
    #[error("{message} at position {position}")]
    Parse { message: String, position: usize },

    /// A target that cannot be written through.
    #[error("cannot write through {0}")]
    NotWritable(String),

    /// A helper failed or is not registered.
    #[error("helper `{name}`: {message}")]
    Helper { name: String, message: String },

    /// An operator symbol that the expression tokenizer cannot recognise.
    #[error("invalid operator symbol `{0}`")]
    InvalidOperator(String),

    /// The storage backend rejected a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn helper(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Helper {
            name: name.into(),
            message: message.into(),
        }
    }
}
