//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a new random EntityId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil identifier, used for entities that were never persisted
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this is the nil identifier
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::nil()
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid entity id: {}", e))
    }
}

/// Registration status of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    /// Usable and visible
    #[default]
    Enabled,
    /// Registered but hidden from design surfaces
    Ignored,
    /// Shadowed by another entity with the same identity
    Duplicate,
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Ignored => write!(f, "ignored"),
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enabled" => Ok(Self::Enabled),
            "ignored" => Ok(Self::Ignored),
            "duplicate" => Ok(Self::Duplicate),
            _ => Err(format!("Invalid entity status: {}", s)),
        }
    }
}

/// Kind of entity stored in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A model definition
    Model,
    /// A component definition
    Component,
    /// A relationship definition
    Relationship,
}

impl EntityType {
    /// Plural name, matching the canonical package directory names
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Component => "components",
            Self::Relationship => "relationships",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Component => write!(f, "component"),
            Self::Relationship => write!(f, "relationship"),
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model" | "models" => Ok(Self::Model),
            "component" | "components" => Ok(Self::Component),
            "relationship" | "relationships" => Ok(Self::Relationship),
            _ => Err(format!("Invalid entity type: {}", s)),
        }
    }
}

/// The connection (registrant) an entity was registered through
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Registrant kind, e.g. `github` or `artifacthub`
    #[serde(default)]
    pub kind: String,

    /// Optional display name of the registrant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Connection {
    /// Create a connection for the given registrant kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: String::new(),
        }
    }
}
