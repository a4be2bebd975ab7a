use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_types::{Attributes, Result};

fn default_id_attribute() -> String {
    "id".into()
}

fn default_true() -> bool {
    true
}

/// Declares an entity kind's identity and default attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: String,
    /// Attribute holding the entity's id.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    /// Values filled in for keys absent at construction.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub defaults: Attributes,
    /// Base location of the kind's resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_root: Option<String>,
}

impl EntitySchema {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id_attribute: default_id_attribute(),
            defaults: Attributes::new(),
            url_root: None,
        }
    }

    /// Loads a schema from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](strata_types::Error::Serialization)
    /// for malformed JSON or a missing `entity_type`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_id_attribute(mut self, attr: impl Into<String>) -> Self {
        self.id_attribute = attr.into();
        self
    }

    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_url_root(mut self, url_root: impl Into<String>) -> Self {
        self.url_root = Some(url_root.into());
        self
    }
}

/// Declares a collection kind's ordering and location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Attribute to keep members sorted by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Re-sort when a member changes.
    #[serde(default = "default_true")]
    pub resort_on_change: bool,
}

impl Default for CollectionSchema {
    fn default() -> Self {
        Self {
            comparator: None,
            url: None,
            resort_on_change: true,
        }
    }
}

impl CollectionSchema {
    /// Loads a schema from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](strata_types::Error::Serialization)
    /// for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_comparator(mut self, attr: impl Into<String>) -> Self {
        self.comparator = Some(attr.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}
