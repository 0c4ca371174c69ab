//! Audit events
//!
//! Events record what a user did to the registry: imports, registrations,
//! status changes. They are published fire-and-forget and never affect the
//! outcome of the operation that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Severity of an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Informational => write!(f, "informational"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A model package was imported
    Register,
    /// A model was exported
    Export,
    /// An entity status was changed
    Update,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Export => "export",
            Self::Update => "update",
        }
    }
}

/// An audit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,

    pub action: EventAction,

    /// Category of the subject, e.g. `entity`
    pub category: String,

    pub severity: Severity,

    pub description: String,

    /// Id of the user that triggered the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Additional context, e.g. an error report
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a builder for an event of the given action
    pub fn builder(action: EventAction) -> EventBuilder {
        EventBuilder::new(action)
    }

    /// Whether this event reports a failure
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn get_metadata(&self, key: &str) -> Option<&String> {
        self.metadata.get(key)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event({} {} at {}",
            self.action.as_str(),
            self.severity,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        if let Some(ref actor) = self.actor {
            write!(f, ", actor={}", actor)?;
        }

        write!(f, ")")
    }
}

/// Builder for [`Event`]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(action: EventAction) -> Self {
        Self {
            event: Event {
                id: Uuid::new_v4(),
                action,
                category: "entity".to_string(),
                severity: Severity::Informational,
                description: String::new(),
                actor: None,
                metadata: HashMap::new(),
                timestamp: Utc::now(),
            },
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.event.category = category.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.event.severity = severity;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.event.description = description.into();
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.event.actor = Some(actor.into());
        self
    }

    /// Add one metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.event.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}
