//! Attribute metadata consulted while building indices.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Per-attribute questions asked during staged construction.
pub trait SchemaLookup: Send + Sync {
    /// Returns true if count indices are maintained for `attr`.
    fn count_enabled(&self, attr: &str) -> bool;

    /// Returns true if `attr` has reverse edges.
    fn reverse_enabled(&self, attr: &str) -> bool;
}

/// Settings for one attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Maintain count indices.
    #[serde(default)]
    pub count: bool,
    /// Maintain reverse edges.
    #[serde(default)]
    pub reverse: bool,
}

/// Attribute settings keyed by attribute name.
///
/// Serialized as a JSON object:
///
/// ```json
/// { "friend": { "count": true, "reverse": true }, "name": {} }
/// ```
///
/// Attributes not listed have every feature disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    attributes: BTreeMap<String, AttributeSchema>,
}

impl Schema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the settings of `attr`.
    #[must_use]
    pub fn with_attribute(mut self, attr: impl Into<String>, settings: AttributeSchema) -> Self {
        self.attributes.insert(attr.into(), settings);
        self
    }

    /// Parse a schema from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Schema`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LoadError::Schema(e.to_string()))
    }

    /// Read a schema file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Schema`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Schema(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Settings of `attr`, if listed.
    #[must_use]
    pub fn get(&self, attr: &str) -> Option<&AttributeSchema> {
        self.attributes.get(attr)
    }
}

impl SchemaLookup for Schema {
    fn count_enabled(&self, attr: &str) -> bool {
        self.get(attr).is_some_and(|a| a.count)
    }

    fn reverse_enabled(&self, attr: &str) -> bool {
        self.get(attr).is_some_and(|a| a.reverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json() {
        let schema =
            Schema::from_json(r#"{"friend": {"count": true, "reverse": true}, "name": {}}"#)
                .expect("parse");
        assert!(schema.count_enabled("friend"));
        assert!(schema.reverse_enabled("friend"));
        assert!(!schema.count_enabled("name"));
        assert!(!schema.count_enabled("unlisted"));
    }

    #[test]
    fn malformed_json_is_schema_error() {
        assert!(matches!(Schema::from_json("[1, 2]"), Err(LoadError::Schema(_))));
    }

    #[test]
    fn builder_matches_json() {
        let built = Schema::new()
            .with_attribute("friend", AttributeSchema { count: true, reverse: false });
        let parsed = Schema::from_json(r#"{"friend": {"count": true}}"#).expect("parse");
        assert_eq!(built, parsed);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(Schema::load(dir.path().join("nope.json")), Err(LoadError::Schema(_))));
    }
}
