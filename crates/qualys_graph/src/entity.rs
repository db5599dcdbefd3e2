//! Graph entities and relationships.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node in the graph.
///
/// Serializes with the graph platform's reserved keys (`_key`, `_type`,
/// `_class`, `displayName`); properties are flattened alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Entity {
    /// Globally unique key
    #[serde(rename = "_key")]
    key: String,
    /// Provider-specific type, e.g. `qualys_host`
    #[serde(rename = "_type")]
    entity_type: String,
    /// Data model classes, e.g. `Host`
    #[serde(rename = "_class")]
    classes: Vec<String>,
    /// Human readable name
    #[serde(rename = "displayName")]
    display_name: String,
    /// Remaining properties
    #[serde(flatten)]
    properties: Map<String, Value>,
}

impl Entity {
    /// New entity with no properties.
    pub fn new(
        key: impl Into<String>,
        entity_type: impl Into<String>,
        classes: &[&str],
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            entity_type: entity_type.into(),
            classes: classes.iter().map(|class| class.to_string()).collect(),
            display_name: display_name.into(),
            properties: Map::new(),
        }
    }

    /// Set a property. `null` values are not stored.
    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.properties.insert(name.to_string(), value);
        }
        self
    }

    /// Look up a property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Verb of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipClass {
    /// Ownership or containment
    Has,
    /// A scanner scans a target
    Scans,
    /// A scanner identified a finding
    Identified,
    /// A finding is an instance of a vulnerability
    Is,
}

impl RelationshipClass {
    fn verb(self) -> String {
        self.to_string().to_lowercase()
    }
}

/// A directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Relationship {
    /// `{from}|{class}|{to}`
    #[serde(rename = "_key")]
    key: String,
    /// `{fromType}_{class}_{toType}`
    #[serde(rename = "_type")]
    relationship_type: String,
    /// Relationship class
    #[serde(rename = "_class")]
    class: RelationshipClass,
    /// Source entity key
    #[serde(rename = "_fromEntityKey")]
    from_entity_key: String,
    /// Target entity key
    #[serde(rename = "_toEntityKey")]
    to_entity_key: String,
    /// Extra properties
    #[serde(flatten)]
    properties: Map<String, Value>,
}

impl Relationship {
    /// Relationship between two known entities.
    ///
    /// # Example
    ///
    /// ```
    /// use qualys_graph::{Entity, Relationship, RelationshipClass};
    ///
    /// let host = Entity::new("qualys_host:1", "qualys_host", &["Host"], "web01");
    /// let finding = Entity::new("qualys_host_finding:1:38170", "qualys_host_finding", &["Finding"], "Expired cert");
    /// let rel = Relationship::new(RelationshipClass::Has, &host, &finding);
    /// assert_eq!(rel.key(), "qualys_host:1|has|qualys_host_finding:1:38170");
    /// assert_eq!(rel.relationship_type(), "qualys_host_has_host_finding");
    /// ```
    pub fn new(class: RelationshipClass, from: &Entity, to: &Entity) -> Self {
        Self::between(class, from.key(), from.entity_type(), to.key(), to.entity_type())
    }

    /// Relationship built from keys and types, for targets not held in memory.
    pub fn between(
        class: RelationshipClass,
        from_key: &str,
        from_type: &str,
        to_key: &str,
        to_type: &str,
    ) -> Self {
        let verb = class.verb();
        Self {
            key: format!("{}|{}|{}", from_key, verb, to_key),
            relationship_type: relationship_type(from_type, &verb, to_type),
            class,
            from_entity_key: from_key.to_string(),
            to_entity_key: to_key.to_string(),
            properties: Map::new(),
        }
    }

    /// Set a property. `null` values are not stored.
    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.properties.insert(name.to_string(), value);
        }
        self
    }
}

/// `qualys_host` + `has` + `qualys_host_finding` gives `qualys_host_has_host_finding`:
/// the target's provider prefix is dropped when both types share it.
fn relationship_type(from_type: &str, verb: &str, to_type: &str) -> String {
    let target = from_type
        .split_once('_')
        .and_then(|(prefix, _)| to_type.strip_prefix(prefix))
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(to_type);
    format!("{}_{}_{}", from_type, verb, target)
}
