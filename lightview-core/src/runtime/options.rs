//! Options accepted by the runtime's constructors and lookups.

use std::fmt;
use std::sync::Arc;

use crate::reactive::Storage;
use crate::registry::ScopeId;
use crate::state::Schema;
use crate::value::Value;

/// Options for [`Runtime::get_signal`](super::Runtime::get_signal) and
/// [`Runtime::get_state`](super::Runtime::get_state).
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Start the lookup in this scope and walk outwards.
    pub scope: Option<ScopeId>,
    /// Create and register a cell with this value when the name is unbound.
    /// Without it an unbound name yields a future.
    pub default: Option<Value>,
}

impl GetOptions {
    pub fn in_scope(scope: ScopeId) -> Self {
        Self {
            scope: Some(scope),
            default: None,
        }
    }

    pub fn or_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Options for [`Runtime::state`](super::Runtime::state).
#[derive(Clone, Default)]
pub struct StateOptions {
    /// Register the state under this name. Also the storage key.
    pub name: Option<String>,
    pub scope: Option<ScopeId>,
    /// Load from and persist to this backend. Needs a name.
    pub storage: Option<Arc<dyn Storage>>,
    pub schema: Option<Schema>,
}

impl StateOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn in_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn persisted(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl fmt::Debug for StateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateOptions")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("persisted", &self.storage.is_some())
            .field("schema", &self.schema.as_ref().map(|s| s.behavior))
            .finish()
    }
}
