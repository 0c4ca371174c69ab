//! Core domain types for the model registry
//!
//! This crate contains the model, component and relationship definitions,
//! the entity encoding used on disk, the canonical package layout shared by
//! every import and export path, and the audit event type.

pub mod component;
pub mod entity;
pub mod error;
pub mod event;
pub mod layout;
pub mod model;
pub mod relationship;
pub mod types;

// Re-exports for convenience
pub use component::{ComponentDefinition, ComponentSpec, ComponentStyles, COMPONENT_SCHEMA_VERSION};
pub use entity::{entity_type_for_schema_version, Entity, OutputFormat};
pub use error::{RegistryError, Result};
pub use event::{Event, EventAction, EventBuilder, Severity};
pub use layout::{PackagePaths, COMPONENTS_DIR, RELATIONSHIPS_DIR};
pub use model::{
    Category, ModelDefinition, ModelMetadata, ModelVersion, DEFAULT_DEFINITION_VERSION,
    MODEL_SCHEMA_VERSION, UNCATEGORIZED,
};
pub use relationship::{RelationshipDefinition, RELATIONSHIP_SCHEMA_VERSION};
pub use types::{Connection, EntityId, EntityStatus, EntityType};
