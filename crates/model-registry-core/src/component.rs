//! Component definitions

use serde::{Deserialize, Serialize};

use crate::model::{default_definition_version, ModelDefinition};
use crate::types::{EntityId, EntityStatus};

/// Schema version carried by component documents
pub const COMPONENT_SCHEMA_VERSION: &str = "components.registry.io/v1beta1";

fn default_component_schema_version() -> String {
    COMPONENT_SCHEMA_VERSION.to_string()
}

/// The resource a component describes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Resource kind, e.g. `Deployment`
    pub kind: String,

    /// Resource API version
    #[serde(default)]
    pub version: String,

    /// Resource schema as an opaque string, usually JSON
    #[serde(default)]
    pub schema: String,
}

/// Visual styles of a component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStyles {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secondary_color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shape: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svg_color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svg_white: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svg_complete: String,
}

/// A component definition owned by exactly one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    #[serde(default)]
    pub id: EntityId,

    #[serde(default = "default_component_schema_version")]
    pub schema_version: String,

    #[serde(default = "default_definition_version")]
    pub version: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub status: EntityStatus,

    pub component: ComponentSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<ComponentStyles>,

    /// Owning model, set at registration and export time
    #[serde(default)]
    pub model: ModelDefinition,
}

impl ComponentDefinition {
    /// Create a component of the given kind with an opaque schema
    pub fn new(kind: impl Into<String>, schema: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            id: EntityId::new(),
            schema_version: default_component_schema_version(),
            version: default_definition_version(),
            display_name: kind.clone(),
            description: String::new(),
            status: EntityStatus::default(),
            component: ComponentSpec {
                kind,
                version: String::new(),
                schema: schema.into(),
            },
            styles: None,
            model: ModelDefinition::default(),
        }
    }

    /// Set the resource API version
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.component.version = version.into();
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
