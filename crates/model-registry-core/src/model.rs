//! Model definitions
//!
//! A model is a named, versioned collection of component and relationship
//! definitions published by one registrant.

use serde::{Deserialize, Serialize};

use crate::component::ComponentDefinition;
use crate::relationship::RelationshipDefinition;
use crate::types::{Connection, EntityId, EntityStatus};

/// Schema version carried by model documents
pub const MODEL_SCHEMA_VERSION: &str = "models.registry.io/v1beta1";

/// Definition version used when a document does not carry one
pub const DEFAULT_DEFINITION_VERSION: &str = "v1.0.0";

/// Fallback category and sub-category name
pub const UNCATEGORIZED: &str = "Uncategorized";

pub(crate) fn default_definition_version() -> String {
    DEFAULT_DEFINITION_VERSION.to_string()
}

fn default_model_schema_version() -> String {
    MODEL_SCHEMA_VERSION.to_string()
}

/// Category a model is filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name
    pub name: String,
}

impl Default for Category {
    fn default() -> Self {
        Self {
            name: UNCATEGORIZED.to_string(),
        }
    }
}

/// Presentation metadata of a model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secondary_color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shape: String,

    /// Colored SVG, either inline markup or a path relative to the asset root
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svg_color: String,

    /// White SVG, either inline markup or a path relative to the asset root
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svg_white: String,

    /// Complete SVG, either inline markup or a path relative to the asset root
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svg_complete: String,

    #[serde(default)]
    pub is_annotation: bool,

    #[serde(default)]
    pub publish_to_registry: bool,
}

/// Content version of the modelled software
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    #[serde(default)]
    pub version: String,
}

/// A model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    #[serde(default)]
    pub id: EntityId,

    #[serde(default = "default_model_schema_version")]
    pub schema_version: String,

    /// Definition version
    #[serde(default = "default_definition_version")]
    pub version: String,

    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub status: EntityStatus,

    #[serde(default)]
    pub registrant: Connection,

    #[serde(default)]
    pub category: Category,

    #[serde(default)]
    pub sub_category: String,

    #[serde(default)]
    pub metadata: ModelMetadata,

    /// Content version
    #[serde(default)]
    pub model: ModelVersion,

    /// `None` means components were not requested, not that there are none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentDefinition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<RelationshipDefinition>>,
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self {
            id: EntityId::nil(),
            schema_version: default_model_schema_version(),
            version: default_definition_version(),
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            status: EntityStatus::default(),
            registrant: Connection::default(),
            category: Category::default(),
            sub_category: UNCATEGORIZED.to_string(),
            metadata: ModelMetadata::default(),
            model: ModelVersion::default(),
            components: None,
            relationships: None,
        }
    }
}

impl ModelDefinition {
    /// Create a model with the given name, lower-cased
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().to_lowercase();
        Self {
            id: EntityId::new(),
            display_name: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Set the content version
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model.version = version.into();
        self
    }

    /// Set the registrant kind
    pub fn with_registrant(mut self, kind: impl Into<String>) -> Self {
        self.registrant = Connection::new(kind);
        self
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Lower-case the model name in place
    pub fn normalize_name(&mut self) {
        self.name = self.name.to_lowercase();
    }

    /// A copy of this model without inline components or relationships,
    /// suitable as the back-reference of a child entity
    pub fn stripped(&self) -> Self {
        Self {
            components: None,
            relationships: None,
            ..self.clone()
        }
    }

    /// Number of inline components, zero when not requested
    pub fn component_count(&self) -> usize {
        self.components.as_ref().map_or(0, Vec::len)
    }

    /// Number of inline relationships, zero when not requested
    pub fn relationship_count(&self) -> usize {
        self.relationships.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentDefinition;

    #[test]
    fn test_new_lowercases_name() {
        let model = ModelDefinition::new("Cert-Manager");
        assert_eq!(model.name, "cert-manager");
        assert_eq!(model.display_name, "cert-manager");
        assert_eq!(model.schema_version, MODEL_SCHEMA_VERSION);
        assert_eq!(model.version, DEFAULT_DEFINITION_VERSION);
        assert!(!model.id.is_nil());
    }

    #[test]
    fn test_components_none_is_not_serialized() {
        let model = ModelDefinition::new("istio");
        let json = serde_json::to_value(&model).unwrap();
        assert!(json.get("components").is_none());
        assert_eq!(json["schemaVersion"], MODEL_SCHEMA_VERSION);
    }

    #[test]
    fn test_stripped_drops_children() {
        let mut model = ModelDefinition::new("istio").with_model_version("1.20.0");
        model.components = Some(vec![ComponentDefinition::new("Gateway", "{}")]);
        model.relationships = Some(vec![]);

        let stripped = model.stripped();
        assert!(stripped.components.is_none());
        assert!(stripped.relationships.is_none());
        assert_eq!(stripped.model.version, "1.20.0");
        assert_eq!(model.component_count(), 1);
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let model: ModelDefinition = serde_json::from_str(r#"{"name":"argo"}"#).unwrap();
        assert_eq!(model.version, DEFAULT_DEFINITION_VERSION);
        assert_eq!(model.category.name, UNCATEGORIZED);
        assert!(model.components.is_none());
    }
}
