//! Runtime configuration.

use serde::Deserialize;

use crate::error::Result;

/// Tunables for a [`Runtime`](crate::Runtime).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use lightview_core::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "max_effect_reruns": 8 }"#).unwrap();
/// assert_eq!(config.max_effect_reruns, 8);
/// assert!(config.builtin_helpers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times an effect may re-run itself because it wrote to a
    /// signal it also reads, before the loop is cut off with a warning.
    pub max_effect_reruns: usize,

    /// Register the standard helper library and default operators.
    pub builtin_helpers: bool,

    /// Bare identifiers that do not resolve come back as their own text.
    /// When disabled they resolve to `Undefined`.
    pub literal_fallback: bool,

    /// How many parsed expressions to keep. The cache is emptied when it
    /// reaches this size; `0` disables caching.
    pub expression_cache_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_effect_reruns: crate::reactive::DEFAULT_RERUN_LIMIT,
            builtin_helpers: true,
            literal_fallback: true,
            expression_cache_size: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
