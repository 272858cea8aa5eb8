//! Persistence backends.
//!
//! A persisted signal or state is backed by a key/value store that speaks
//! strings, the way browser `localStorage` does. Values are stored as JSON.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;

/// External key/value storage for persisted cells.
pub trait Storage: Send + Sync {
    /// Read the stored string for `key`, if any.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process storage, mostly useful for tests and server-side rendering.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
