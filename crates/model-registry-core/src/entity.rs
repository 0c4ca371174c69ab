//! Entity sum type and document encoding
//!
//! Every document found in a package is one of three definitions. The type of
//! a document is derived from the prefix of its `schemaVersion` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::component::ComponentDefinition;
use crate::error::{RegistryError, Result};
use crate::model::ModelDefinition;
use crate::relationship::RelationshipDefinition;
use crate::types::EntityType;

/// Encoding of entity documents on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Serialize a value in this format
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec_pretty(value)?),
            Self::Yaml => Ok(serde_yaml::to_string(value)?.into_bytes()),
        }
    }

    /// Parse bytes in this format into a generic JSON value
    pub fn decode_value(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            Self::Json => {
                serde_json::from_slice(bytes).map_err(|e| RegistryError::Unmarshal(e.to_string()))
            }
            Self::Yaml => {
                serde_yaml::from_slice(bytes).map_err(|e| RegistryError::Unmarshal(e.to_string()))
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = RegistryError;

    /// `oci` is accepted and encodes entities as JSON
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "oci" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(RegistryError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Derive the entity type from a `schemaVersion` value
pub fn entity_type_for_schema_version(schema_version: &str) -> Result<EntityType> {
    let prefix = schema_version.split('.').next().unwrap_or_default();
    match prefix {
        "models" => Ok(EntityType::Model),
        "components" => Ok(EntityType::Component),
        "relationships" => Ok(EntityType::Relationship),
        _ => Err(RegistryError::InvalidSchemaVersion(schema_version.to_string())),
    }
}

/// One registrable entity
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Model(ModelDefinition),
    Component(ComponentDefinition),
    Relationship(RelationshipDefinition),
}

impl Entity {
    /// Type of this entity
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Model(_) => EntityType::Model,
            Self::Component(_) => EntityType::Component,
            Self::Relationship(_) => EntityType::Relationship,
        }
    }

    /// Human-readable identity used in reports and logs
    pub fn identity(&self) -> String {
        match self {
            Self::Model(m) => m.name.clone(),
            Self::Component(c) => c.component.kind.clone(),
            Self::Relationship(r) => {
                format!("{}-{}-{}", r.kind, r.relationship_type, r.sub_type)
            }
        }
    }

    /// Name of the model this entity is or belongs to
    pub fn model_name(&self) -> &str {
        match self {
            Self::Model(m) => &m.name,
            Self::Component(c) => &c.model.name,
            Self::Relationship(r) => &r.model.name,
        }
    }

    /// Decode a document, detecting its type from `schemaVersion`
    pub fn decode(bytes: &[u8], format: OutputFormat) -> Result<Self> {
        let value = format.decode_value(bytes)?;
        Self::from_value(value)
    }

    /// Decode a file, detecting the format from its extension
    pub fn decode_file(path: &Path) -> Result<Self> {
        let format = OutputFormat::from_path(path).ok_or_else(|| {
            RegistryError::UnsupportedFormat(path.display().to_string())
        })?;
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes, format)
    }

    /// Convert a generic document into an entity
    pub fn from_value(value: Value) -> Result<Self> {
        let schema_version = value
            .get("schemaVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let unmarshal = |e: serde_json::Error| RegistryError::Unmarshal(e.to_string());

        match entity_type_for_schema_version(&schema_version)? {
            EntityType::Model => serde_json::from_value(value).map(Self::Model).map_err(unmarshal),
            EntityType::Component => {
                serde_json::from_value(value).map(Self::Component).map_err(unmarshal)
            }
            EntityType::Relationship => {
                serde_json::from_value(value).map(Self::Relationship).map_err(unmarshal)
            }
        }
    }

    /// Encode this entity in the given format
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        match self {
            Self::Model(m) => format.encode(m),
            Self::Component(c) => format.encode(c),
            Self::Relationship(r) => format.encode(r),
        }
    }

    /// Attach a model back-reference to children that lack one
    pub fn adopt(&mut self, model: &ModelDefinition) {
        match self {
            Self::Component(c) if !c.has_model() => c.model = model.stripped(),
            Self::Relationship(r) if !r.has_model() => r.model = model.stripped(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("oci".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("YAML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_schema_version_prefix_detection() {
        assert_eq!(
            entity_type_for_schema_version("components.registry.io/v1beta1").unwrap(),
            EntityType::Component
        );
        assert!(matches!(
            entity_type_for_schema_version("widgets.registry.io/v1"),
            Err(RegistryError::InvalidSchemaVersion(_))
        ));
    }

    #[test]
    fn test_decode_yaml_component() {
        let doc = b"schemaVersion: components.registry.io/v1beta1\ncomponent:\n  kind: Pod\n  version: v1\n";
        let entity = Entity::decode(doc, OutputFormat::Yaml).unwrap();
        assert_eq!(entity.entity_type(), EntityType::Component);
        assert_eq!(entity.identity(), "Pod");
    }

    #[test]
    fn test_decode_missing_schema_version() {
        let err = Entity::decode(br#"{"name":"x"}"#, OutputFormat::Json).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchemaVersion(_)));
    }

    #[test]
    fn test_decode_garbage_is_unmarshal_error() {
        let err = Entity::decode(b"{not json", OutputFormat::Json).unwrap_err();
        assert!(matches!(err, RegistryError::Unmarshal(_)));
    }

    #[test]
    fn test_encode_then_decode_model() {
        let model = ModelDefinition::new("kyverno").with_model_version("1.11.0");
        let bytes = Entity::Model(model.clone()).encode(OutputFormat::Yaml).unwrap();
        assert_eq!(Entity::decode(&bytes, OutputFormat::Yaml).unwrap(), Entity::Model(model));
    }

    #[test]
    fn test_adopt_only_fills_missing_reference() {
        let model = ModelDefinition::new("kyverno");
        let mut orphan = Entity::Component(ComponentDefinition::new("Policy", "{}"));
        orphan.adopt(&model);
        assert_eq!(orphan.model_name(), "kyverno");

        let other = ModelDefinition::new("other");
        let mut owned =
            Entity::Component(ComponentDefinition::new("Policy", "{}").with_model(other));
        owned.adopt(&model);
        assert_eq!(owned.model_name(), "other");
    }
}
