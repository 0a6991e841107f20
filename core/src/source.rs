//! Read-only access to the host's live entity states.

use crate::error::{ProgressError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// States the host uses for an entity it cannot read.
pub const STATE_UNAVAILABLE: &str = "unavailable";
pub const STATE_UNKNOWN: &str = "unknown";

/// Narrow read interface the resolver needs from its environment.
///
/// Implementations are passed explicitly to every resolution, so several
/// independent cards (or tests) can each use their own source.
pub trait EntitySource {
    /// Whether the identifier exists at all.
    fn has_entity(&self, id: &str) -> bool;

    /// Raw state string, `None` when the entity does not exist.
    fn state(&self, id: &str) -> Option<&str>;

    /// Attribute value, `None` when the entity or the attribute is missing.
    fn attribute(&self, id: &str, name: &str) -> Option<&serde_json::Value>;

    /// Entity exists and its state is neither `unavailable` nor `unknown`.
    fn is_available(&self, id: &str) -> bool {
        matches!(self.state(id), Some(s) if s != STATE_UNAVAILABLE && s != STATE_UNKNOWN)
    }
}

/// One entity as the host reports it: a string state and an attribute bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityState {
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl EntityState {
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// In-memory snapshot of entity states, keyed by entity id.
///
/// Deserializes from the host's JSON state dump:
///
/// ```json
/// { "sensor.power": { "state": "42", "attributes": { "unit_of_measurement": "W" } } }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    entities: HashMap<String, EntityState>,
}

impl StateSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity.
    #[must_use]
    pub fn with_entity(mut self, id: impl Into<String>, state: EntityState) -> Self {
        self.insert(id, state);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, state: EntityState) {
        self.entities.insert(id.into(), state);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Parse a JSON state dump.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ProgressError::parse_with_source("Failed to parse state snapshot", e))
    }

    /// Load a JSON state dump from disk.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl EntitySource for StateSnapshot {
    fn has_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    fn state(&self, id: &str) -> Option<&str> {
        self.entities.get(id).map(|e| e.state.as_str())
    }

    fn attribute(&self, id: &str, name: &str) -> Option<&serde_json::Value> {
        self.entities.get(id).and_then(|e| e.attributes.get(name))
    }
}
