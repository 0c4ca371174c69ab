//! Relationship definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{default_definition_version, ModelDefinition};
use crate::types::{EntityId, EntityStatus};

/// Schema version carried by relationship documents
pub const RELATIONSHIP_SCHEMA_VERSION: &str = "relationships.registry.io/v1beta1";

fn default_relationship_schema_version() -> String {
    RELATIONSHIP_SCHEMA_VERSION.to_string()
}

/// A typed association rule between components of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDefinition {
    #[serde(default)]
    pub id: EntityId,

    #[serde(default = "default_relationship_schema_version")]
    pub schema_version: String,

    #[serde(default = "default_definition_version")]
    pub version: String,

    /// Relationship kind, e.g. `edge` or `hierarchical`
    pub kind: String,

    #[serde(rename = "type", default)]
    pub relationship_type: String,

    #[serde(default)]
    pub sub_type: String,

    #[serde(default)]
    pub status: EntityStatus,

    /// Opaque selector document
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub selectors: Value,

    /// Owning model, set at registration and export time
    #[serde(default)]
    pub model: ModelDefinition,
}

impl RelationshipDefinition {
    /// Create a relationship
    pub fn new(
        kind: impl Into<String>,
        relationship_type: impl Into<String>,
        sub_type: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            schema_version: default_relationship_schema_version(),
            version: default_definition_version(),
            kind: kind.into(),
            relationship_type: relationship_type.into(),
            sub_type: sub_type.into(),
            status: EntityStatus::default(),
            selectors: Value::Null,
            model: ModelDefinition::default(),
        }
    }

    /// Set the selector document
    pub fn with_selectors(mut self, selectors: Value) -> Self {
        self.selectors = selectors;
        self
    }

    /// Set the owning model
    pub fn with_model(mut self, model: ModelDefinition) -> Self {
        self.model = model;
        self
    }

    /// Whether the owning model back-reference is set
    pub fn has_model(&self) -> bool {
        !self.model.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_field_is_renamed() {
        let rel = RelationshipDefinition::new("edge", "binding", "mount")
            .with_selectors(json!([{"allow": {"from": [], "to": []}}]));
        let value = serde_json::to_value(&rel).unwrap();
        assert_eq!(value["type"], "binding");
        assert_eq!(value["subType"], "mount");
        assert_eq!(value["schemaVersion"], RELATIONSHIP_SCHEMA_VERSION);
    }
}
