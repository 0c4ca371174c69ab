//! Listing, status and single-component registration services

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use model_registry_core::{
    ComponentDefinition, Connection, Entity, EntityId, EntityStatus, EntityType, Event,
    EventAction, ModelDefinition, Severity,
};
use model_registry_store::{
    EventPublisher, ModelFilter, Pagination, RegistrantFilter, RegistrantSummary, RegistryManager,
    SortOrder,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::events::spawn_publish;
use crate::summary::SummaryCache;
use crate::svg::SvgStore;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Paging and search parameters of a listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub pagesize: Option<String>,
    pub search: Option<String>,
    pub order: Option<String>,
    pub sort: Option<String>,
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// One-based page number
    pub page: usize,
    /// `None` when every result was requested
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListQuery {
    /// Page defaults to 1 and page size to 25, `pagesize=all` is unlimited
    pub fn window(&self) -> PageWindow {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);

        let limit = match self.pagesize.as_deref().map(str::trim) {
            Some(size) if size.eq_ignore_ascii_case("all") => None,
            Some(size) => Some(
                size.parse::<usize>()
                    .ok()
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_PAGE_SIZE),
            ),
            None => Some(DEFAULT_PAGE_SIZE),
        };

        PageWindow {
            page,
            limit,
            offset: limit.map_or(0, |l| (page - 1) * l),
        }
    }

    fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn sort(&self) -> SortOrder {
        self.sort.as_deref().map(SortOrder::parse).unwrap_or_default()
    }
}

/// A model listed once, with the number of other entries sharing its name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateModel {
    #[serde(flatten)]
    pub model: ModelDefinition,
    pub duplicates: usize,
}

/// Merge models sharing a name, keeping the first of each in order
pub fn find_duplicate_models(models: Vec<ModelDefinition>) -> Vec<DuplicateModel> {
    let mut merged: Vec<DuplicateModel> = Vec::with_capacity(models.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for model in models {
        match seen.get(&model.name) {
            Some(&index) => merged[index].duplicates += 1,
            None => {
                seen.insert(model.name.clone(), merged.len());
                merged.push(DuplicateModel {
                    model,
                    duplicates: 0,
                });
            }
        }
    }
    merged
}

/// One page of models
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelListing {
    pub page: usize,
    pub page_size: usize,
    pub count: i64,
    pub models: Vec<DuplicateModel>,
}

/// One page of registrants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantListing {
    pub page: usize,
    pub page_size: usize,
    pub count: i64,
    pub registrants: Vec<RegistrantSummary>,
}

fn page_size(window: &PageWindow, count: i64) -> usize {
    window.limit.unwrap_or(count.max(0) as usize)
}

/// Body of a status update
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub displayname: String,
}

/// Body of a single component registration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRegistration {
    pub connection: Connection,
    pub entity_type: EntityType,
    pub entity: Value,
}

/// Read and maintenance operations on the registry
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_models(&self, query: &ListQuery) -> ServiceResult<ModelListing>;

    async fn list_registrants(&self, query: &ListQuery) -> ServiceResult<RegistrantListing>;

    async fn update_status(
        &self,
        entity_type: EntityType,
        update: StatusUpdate,
        actor: Option<String>,
    ) -> ServiceResult<()>;

    async fn register_component(&self, registration: ComponentRegistration) -> ServiceResult<()>;
}

/// Default catalog service
pub struct DefaultCatalogService {
    registry: Arc<dyn RegistryManager>,
    publisher: Arc<dyn EventPublisher>,
    svg_store: Arc<dyn SvgStore>,
    summary: Arc<SummaryCache>,
}

impl DefaultCatalogService {
    pub fn new(
        registry: Arc<dyn RegistryManager>,
        publisher: Arc<dyn EventPublisher>,
        svg_store: Arc<dyn SvgStore>,
        summary: Arc<SummaryCache>,
    ) -> Self {
        Self {
            registry,
            publisher,
            svg_store,
            summary,
        }
    }
}

#[async_trait]
impl CatalogService for DefaultCatalogService {
    #[instrument(skip(self, query))]
    async fn list_models(&self, query: &ListQuery) -> ServiceResult<ModelListing> {
        let window = query.window();
        let mut filter = ModelFilter::new().paginate(window.limit, window.offset);
        if let Some(search) = query.search() {
            filter = filter.search(search);
        }
        if let Some(order) = query.order.as_deref().filter(|o| !o.is_empty()) {
            filter = filter.order_on(order, query.sort());
        } else {
            filter.sort = query.sort();
        }

        let page = self.registry.get_entities(&filter.into()).await?;
        let models = page
            .entities
            .into_iter()
            .filter_map(|entity| match entity {
                Entity::Model(model) => Some(model),
                _ => None,
            })
            .collect();

        Ok(ModelListing {
            page: window.page,
            page_size: page_size(&window, page.count),
            count: page.count,
            models: find_duplicate_models(models),
        })
    }

    #[instrument(skip(self, query))]
    async fn list_registrants(&self, query: &ListQuery) -> ServiceResult<RegistrantListing> {
        let window = query.window();
        let filter = RegistrantFilter {
            search: query.search().map(str::to_string),
            sort: query.sort(),
            pagination: Pagination::new(window.limit, window.offset),
        };

        let (registrants, count) = self.registry.get_registrants(&filter).await?;
        Ok(RegistrantListing {
            page: window.page,
            page_size: page_size(&window, count),
            count,
            registrants,
        })
    }

    #[instrument(skip(self, update, actor), fields(id = %update.id, status = %update.status))]
    async fn update_status(
        &self,
        entity_type: EntityType,
        update: StatusUpdate,
        actor: Option<String>,
    ) -> ServiceResult<()> {
        let parsed = update
            .id
            .parse::<EntityId>()
            .map_err(ServiceError::InvalidInput)
            .and_then(|id| {
                update
                    .status
                    .parse::<EntityStatus>()
                    .map(|status| (id, status))
                    .map_err(ServiceError::InvalidInput)
            });

        let result = match parsed {
            Ok((id, status)) => self
                .registry
                .update_entity_status(id, status, entity_type)
                .await
                .map_err(ServiceError::from),
            Err(e) => Err(e),
        };

        if let Some(actor) = actor {
            let builder = Event::builder(EventAction::Update)
                .category(entity_type.to_string())
                .actor(actor);
            let event = match &result {
                Ok(()) => builder
                    .severity(Severity::Informational)
                    .description(format!(
                        "Status of '{}' updated to {}.",
                        update.displayname, update.status
                    ))
                    .build(),
                Err(e) => builder
                    .severity(Severity::Error)
                    .description(format!(
                        "Failed to update '{}' status to {}",
                        update.displayname, update.status
                    ))
                    .metadata("error", e.to_string())
                    .build(),
            };
            spawn_publish(&self.publisher, event);
        }

        if result.is_ok() {
            info!(entity_type = %entity_type, "Updated entity status");
        }
        result
    }

    #[instrument(skip(self, registration), fields(registrant = %registration.connection.kind))]
    async fn register_component(&self, registration: ComponentRegistration) -> ServiceResult<()> {
        if registration.entity_type != EntityType::Component {
            return Err(ServiceError::InvalidInput(format!(
                "Unsupported entity type: {}",
                registration.entity_type
            )));
        }

        let mut component: ComponentDefinition = serde_json::from_value(registration.entity)
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid component: {}", e)))?;

        let svg_store = self.svg_store.clone();
        let component = tokio::task::spawn_blocking(move || {
            if let Err(e) = svg_store.write_component(&mut component) {
                warn!(component = %component.component.kind, error = %e, "Failed to write component SVGs");
            }
            component
        })
        .await?;

        let entity = Entity::Component(component);
        self.registry
            .register_entity(&registration.connection, &entity)
            .await
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        info!(component = %entity.identity(), "Registered component");
        self.summary.spawn_refresh();
        Ok(())
    }
}
