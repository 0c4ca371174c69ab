//! In-memory registry
//!
//! A process-local `RegistryManager` used by the server when no external
//! registry is configured, and by the tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use model_registry_core::{
    ComponentDefinition, Connection, Entity, EntityId, EntityStatus, EntityType, ModelDefinition,
    RelationshipDefinition,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{EntityRegistrationError, StoreError, StoreResult};
use crate::filter::{matches_text, ComponentFilter, EntityFilter, ModelFilter, RegistrantFilter, SortOrder};
use crate::registry::{EntityPage, RegistrantSummary, RegistryManager, RegistrySummary};

#[derive(Debug, Default)]
struct RegistryState {
    /// Model headers, stored without inline children
    models: Vec<ModelDefinition>,
    components: Vec<ComponentDefinition>,
    relationships: Vec<RelationshipDefinition>,
}

impl RegistryState {
    /// Find or insert the model header an entity belongs to
    fn upsert_model(
        &mut self,
        connection: &Connection,
        model: &ModelDefinition,
    ) -> StoreResult<ModelDefinition> {
        let name = model.name.trim().to_lowercase();
        if name.is_empty() {
            return Err(StoreError::InvalidModel("model name is empty".to_string()));
        }

        if let Some(existing) = self
            .models
            .iter()
            .find(|m| m.name == name && m.model.version == model.model.version)
        {
            return Ok(existing.clone());
        }

        let mut stored = model.stripped();
        stored.name = name;
        if stored.id.is_nil() {
            stored.id = EntityId::new();
        }
        if stored.display_name.is_empty() {
            stored.display_name = stored.name.clone();
        }
        stored.registrant = connection.clone();

        debug!(model = %stored.name, version = %stored.model.version, "Registered model");
        self.models.push(stored.clone());
        Ok(stored)
    }

    fn inline_children(&self, model: &ModelDefinition, filter: &ModelFilter) -> ModelDefinition {
        let mut out = model.clone();
        if filter.components {
            out.components = Some(
                self.components
                    .iter()
                    .filter(|c| c.model.id == model.id)
                    .cloned()
                    .collect(),
            );
        }
        if filter.relationships {
            out.relationships = Some(
                self.relationships
                    .iter()
                    .filter(|r| r.model.id == model.id)
                    .cloned()
                    .collect(),
            );
        }
        out
    }

    fn model_matches(model: &ModelDefinition, filter: &ModelFilter) -> bool {
        if let Some(ref id) = filter.id {
            if !id.is_empty() && !model.id.to_string().eq_ignore_ascii_case(id) {
                return false;
            }
        }

        if let Some(ref version) = filter.version {
            if !version.is_empty() && model.model.version != *version {
                return false;
            }
        }

        if let Some(status) = filter.status {
            if model.status != status {
                return false;
            }
        }

        if let Some(ref search) = filter.search {
            let search = search.to_lowercase();
            if !model.name.contains(&search) && !model.display_name.to_lowercase().contains(&search)
            {
                return false;
            }
        }

        matches_text(&filter.name, &model.name, filter.greedy)
            && matches_text(&filter.display_name, &model.display_name, filter.greedy)
            && matches_text(&filter.registrant, &model.registrant.kind, false)
            && matches_text(&filter.category, &model.category.name, false)
    }

    fn find_models(&self, filter: &ModelFilter) -> EntityPage {
        let mut models: Vec<&ModelDefinition> = self
            .models
            .iter()
            .filter(|m| Self::model_matches(m, filter))
            .collect();

        match filter.order_on.as_deref() {
            Some("displayName") | Some("display_name") => {
                models.sort_by(|a, b| a.display_name.cmp(&b.display_name))
            }
            Some("version") => models.sort_by(|a, b| a.model.version.cmp(&b.model.version)),
            _ => models.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        if filter.sort == SortOrder::Descending {
            models.reverse();
        }

        let count = models.len() as i64;
        let entities = filter
            .pagination
            .apply(models)
            .into_iter()
            .map(|m| Entity::Model(self.inline_children(m, filter)))
            .collect();

        EntityPage { entities, count }
    }

    fn find_components(&self, filter: &ComponentFilter) -> EntityPage {
        let components: Vec<&ComponentDefinition> = self
            .components
            .iter()
            .filter(|c| {
                filter
                    .id
                    .as_ref()
                    .map_or(true, |id| c.id.to_string().eq_ignore_ascii_case(id))
                    && matches_text(&filter.name, &c.component.kind, filter.greedy)
                    && matches_text(&filter.model_name, &c.model.name, false)
                    && matches_text(&filter.api_version, &c.component.version, false)
            })
            .collect();

        let count = components.len() as i64;
        let entities = filter
            .pagination
            .apply(components)
            .into_iter()
            .map(|c| Entity::Component(c.clone()))
            .collect();

        EntityPage { entities, count }
    }
}

fn validate_schema(schema: &str) -> StoreResult<()> {
    if schema.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(schema)
        .map(|_| ())
        .map_err(|e| StoreError::SchemaValidation(format!("component schema is not valid JSON: {}", e)))
}

fn tally<'a>(
    by_kind: &'a mut BTreeMap<String, RegistrantSummary>,
    kind: &str,
) -> &'a mut RegistrantSummary {
    by_kind
        .entry(kind.to_string())
        .or_insert_with(|| RegistrantSummary {
            kind: kind.to_string(),
            models: 0,
            components: 0,
            relationships: 0,
        })
}

/// Process-local registry backed by a tokio `RwLock`
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryManager for InMemoryRegistry {
    async fn get_entities(&self, filter: &EntityFilter) -> StoreResult<EntityPage> {
        let state = self.state.read().await;
        Ok(match filter {
            EntityFilter::Model(f) => state.find_models(f),
            EntityFilter::Component(f) => state.find_components(f),
        })
    }

    async fn register_entity(
        &self,
        connection: &Connection,
        entity: &Entity,
    ) -> Result<(), EntityRegistrationError> {
        if connection.kind.trim().is_empty() {
            return Err(EntityRegistrationError::registrant(StoreError::InvalidRegistrant(
                "registrant kind is empty".to_string(),
            )));
        }

        let mut state = self.state.write().await;

        match entity {
            Entity::Model(model) => {
                state
                    .upsert_model(connection, model)
                    .map_err(EntityRegistrationError::model)?;
            }
            Entity::Component(component) => {
                if component.component.kind.trim().is_empty() {
                    return Err(EntityRegistrationError::other(StoreError::SchemaValidation(
                        "component kind is empty".to_string(),
                    )));
                }
                validate_schema(&component.component.schema)
                    .map_err(EntityRegistrationError::other)?;

                let model = state
                    .upsert_model(connection, &component.model)
                    .map_err(EntityRegistrationError::model)?;

                let exists = state.components.iter().any(|c| {
                    c.model.id == model.id
                        && c.component.kind == component.component.kind
                        && c.component.version == component.component.version
                });
                if !exists {
                    let mut stored = component.clone();
                    stored.model = model;
                    if stored.id.is_nil() {
                        stored.id = EntityId::new();
                    }
                    state.components.push(stored);
                }
            }
            Entity::Relationship(relationship) => {
                if relationship.kind.trim().is_empty() {
                    return Err(EntityRegistrationError::other(StoreError::SchemaValidation(
                        "relationship kind is empty".to_string(),
                    )));
                }

                let model = state
                    .upsert_model(connection, &relationship.model)
                    .map_err(EntityRegistrationError::model)?;

                let exists = state.relationships.iter().any(|r| {
                    r.model.id == model.id
                        && ((!relationship.id.is_nil() && r.id == relationship.id)
                            || (r.kind == relationship.kind
                                && r.relationship_type == relationship.relationship_type
                                && r.sub_type == relationship.sub_type
                                && r.selectors == relationship.selectors))
                });
                if !exists {
                    let mut stored = relationship.clone();
                    stored.model = model;
                    if stored.id.is_nil() {
                        stored.id = EntityId::new();
                    }
                    state.relationships.push(stored);
                }
            }
        }

        Ok(())
    }

    async fn update_entity_status(
        &self,
        id: EntityId,
        status: EntityStatus,
        entity_type: EntityType,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;

        let slot = match entity_type {
            EntityType::Model => state
                .models
                .iter_mut()
                .find(|m| m.id == id)
                .map(|m| &mut m.status),
            EntityType::Component => state
                .components
                .iter_mut()
                .find(|c| c.id == id)
                .map(|c| &mut c.status),
            EntityType::Relationship => state
                .relationships
                .iter_mut()
                .find(|r| r.id == id)
                .map(|r| &mut r.status),
        };

        match slot {
            Some(current) => {
                *current = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{} {}", entity_type, id))),
        }
    }

    async fn get_registrants(
        &self,
        filter: &RegistrantFilter,
    ) -> StoreResult<(Vec<RegistrantSummary>, i64)> {
        let state = self.state.read().await;

        let mut by_kind: BTreeMap<String, RegistrantSummary> = BTreeMap::new();
        for model in &state.models {
            tally(&mut by_kind, &model.registrant.kind).models += 1;
        }
        for component in &state.components {
            tally(&mut by_kind, &component.model.registrant.kind).components += 1;
        }
        for relationship in &state.relationships {
            tally(&mut by_kind, &relationship.model.registrant.kind).relationships += 1;
        }

        let mut registrants: Vec<RegistrantSummary> = by_kind
            .into_values()
            .filter(|r| matches_text(&filter.search, &r.kind, true))
            .collect();
        if filter.sort == SortOrder::Descending {
            registrants.reverse();
        }

        let count = registrants.len() as i64;
        Ok((filter.pagination.apply(registrants), count))
    }

    async fn summary(&self) -> StoreResult<RegistrySummary> {
        let state = self.state.read().await;
        let registrants: BTreeSet<&str> = state
            .models
            .iter()
            .map(|m| m.registrant.kind.as_str())
            .collect();

        Ok(RegistrySummary {
            registrants: registrants.len() as i64,
            models: state.models.len() as i64,
            components: state.components.len() as i64,
            relationships: state.relationships.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn github() -> Connection {
        Connection::new("github")
    }

    fn component(model: &ModelDefinition, kind: &str) -> Entity {
        Entity::Component(
            ComponentDefinition::new(kind, r#"{"type":"object"}"#).with_model(model.clone()),
        )
    }

    #[tokio::test]
    async fn test_register_and_lookup_model() {
        let registry = InMemoryRegistry::new();
        let model = ModelDefinition::new("cert-manager").with_model_version("v1.13.0");

        registry.register_entity(&github(), &Entity::Model(model.clone())).await.unwrap();
        registry.register_entity(&github(), &component(&model, "Issuer")).await.unwrap();
        registry.register_entity(&github(), &component(&model, "Certificate")).await.unwrap();

        let filter = ModelFilter::new().name("cert").greedy(true).with_components(true);
        let page = registry.get_entities(&filter.into()).await.unwrap();
        assert_eq!(page.count, 1);

        let Entity::Model(found) = &page.entities[0] else {
            panic!("expected a model");
        };
        assert_eq!(found.registrant.kind, "github");
        assert_eq!(found.component_count(), 2);
        assert!(found.relationships.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let model = ModelDefinition::new("istio");

        for _ in 0..3 {
            registry.register_entity(&github(), &component(&model, "Gateway")).await.unwrap();
        }

        let summary = registry.summary().await.unwrap();
        assert_eq!(summary.models, 1);
        assert_eq!(summary.components, 1);
    }

    #[tokio::test]
    async fn test_registration_error_classification() {
        let registry = InMemoryRegistry::new();
        let model = ModelDefinition::new("istio");

        let err = registry
            .register_entity(&Connection::default(), &Entity::Model(model.clone()))
            .await
            .unwrap_err();
        assert!(err.registrant_error && !err.model_error);

        let orphan = Entity::Component(ComponentDefinition::new("Gateway", "{}"));
        let err = registry.register_entity(&github(), &orphan).await.unwrap_err();
        assert!(err.model_error && !err.registrant_error);

        let bad_schema = Entity::Component(
            ComponentDefinition::new("Gateway", "{not json").with_model(model),
        );
        let err = registry.register_entity(&github(), &bad_schema).await.unwrap_err();
        assert!(!err.model_error && !err.registrant_error);
        assert!(matches!(err.source, StoreError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn test_exact_name_does_not_match_substring() {
        let registry = InMemoryRegistry::new();
        registry
            .register_entity(&github(), &Entity::Model(ModelDefinition::new("cert-manager")))
            .await
            .unwrap();

        let page = registry
            .get_entities(&ModelFilter::new().name("cert").into())
            .await
            .unwrap();
        assert_eq!(page.count, 0);
    }

    #[tokio::test]
    async fn test_update_status() {
        let registry = InMemoryRegistry::new();
        let model = ModelDefinition::new("argo");
        registry.register_entity(&github(), &Entity::Model(model.clone())).await.unwrap();

        registry
            .update_entity_status(model.id, EntityStatus::Ignored, EntityType::Model)
            .await
            .unwrap();

        let page = registry.get_entities(&ModelFilter::new().into()).await.unwrap();
        let Entity::Model(found) = &page.entities[0] else {
            panic!("expected a model");
        };
        assert_eq!(found.status, EntityStatus::Ignored);

        let err = registry
            .update_entity_status(EntityId::new(), EntityStatus::Enabled, EntityType::Component)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_registrant_listing() {
        let registry = InMemoryRegistry::new();
        let a = ModelDefinition::new("a");
        let b = ModelDefinition::new("b");
        registry.register_entity(&github(), &component(&a, "X")).await.unwrap();
        registry
            .register_entity(&Connection::new("artifacthub"), &Entity::Model(b))
            .await
            .unwrap();

        let (registrants, count) = registry
            .get_registrants(&RegistrantFilter::default())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(registrants[0].kind, "artifacthub");
        assert_eq!(registrants[1].components, 1);
    }
}
