//! Raw sender → display name lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maps raw sender identifiers to display names.
///
/// Lookup is exact-string keyed. Anything not in the table resolves to the
/// fallback, so the mapping is total over every input string.
///
/// # Example
///
/// ```
/// use chatmood::enrich::SenderMap;
///
/// let map = SenderMap::new("Otro")
///     .with_entry("+57 300 1234567", "Mamá")
///     .with_entry("Juan P.", "Juan");
///
/// assert_eq!(map.normalize("Juan P."), "Juan");
/// assert_eq!(map.normalize("juan p."), "Otro");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderMap {
    table: HashMap<String, String>,
    fallback: String,
}

impl SenderMap {
    /// Creates an empty map: every sender resolves to `fallback`.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            table: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    /// Builds a map from a JSON object such as `{"Juan P.": "Juan"}`.
    ///
    /// `setting` names the environment variable the JSON came from, for the
    /// error message.
    pub fn from_json(
        setting: &'static str,
        json: &str,
        fallback: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let table: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| {
            ConfigError::invalid(setting, format!("expected a JSON object of strings: {e}"))
        })?;
        Ok(Self {
            table,
            fallback: fallback.into(),
        })
    }

    /// Adds a mapping entry.
    #[must_use]
    pub fn with_entry(mut self, raw: impl Into<String>, display: impl Into<String>) -> Self {
        self.table.insert(raw.into(), display.into());
        self
    }

    /// Resolves a raw sender to its display name.
    pub fn normalize(&self, raw_sender: &str) -> &str {
        normalize(raw_sender, &self.table, &self.fallback)
    }

    /// Returns the fallback display name.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Returns the number of mapping entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Resolves `raw_sender` through `mapping`, or to `fallback` when absent.
pub fn normalize<'a>(
    raw_sender: &str,
    mapping: &'a HashMap<String, String>,
    fallback: &'a str,
) -> &'a str {
    mapping.get(raw_sender).map_or(fallback, String::as_str)
}
