//! Registry contract
//!
//! This module defines the RegistryManager trait through which the import,
//! export and listing services reach the backing registry.

use async_trait::async_trait;
use model_registry_core::{Connection, Entity, EntityId, EntityStatus, EntityType};
use serde::{Deserialize, Serialize};

use crate::error::{EntityRegistrationError, StoreResult};
use crate::filter::{EntityFilter, RegistrantFilter};

/// One page of entities plus the total match count
#[derive(Debug, Clone, Default)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    /// Number of matches before pagination
    pub count: i64,
}

/// Per-registrant entity counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantSummary {
    pub kind: String,
    pub models: i64,
    pub components: i64,
    pub relationships: i64,
}

/// Totals across the whole registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub registrants: i64,
    pub models: i64,
    pub components: i64,
    pub relationships: i64,
}

/// Backing registry
#[async_trait]
pub trait RegistryManager: Send + Sync {
    /// Look up entities matching a filter
    async fn get_entities(&self, filter: &EntityFilter) -> StoreResult<EntityPage>;

    /// Register one entity through the given connection
    ///
    /// Registering an entity that is already present succeeds without
    /// creating a second copy.
    async fn register_entity(
        &self,
        connection: &Connection,
        entity: &Entity,
    ) -> Result<(), EntityRegistrationError>;

    /// Change the status of a stored entity
    async fn update_entity_status(
        &self,
        id: EntityId,
        status: EntityStatus,
        entity_type: EntityType,
    ) -> StoreResult<()>;

    /// List registrants with their entity counts
    async fn get_registrants(
        &self,
        filter: &RegistrantFilter,
    ) -> StoreResult<(Vec<RegistrantSummary>, i64)>;

    /// Compute registry-wide totals
    async fn summary(&self) -> StoreResult<RegistrySummary>;
}
