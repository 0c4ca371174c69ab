//! API request handlers
//!
//! This module implements HTTP request handlers for all API endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use model_registry_core::EntityType;
use model_registry_service::{
    ComponentRegistration, ExportOutcome, ExportQuery, ImportRequest, ListQuery, ModelListing,
    RegistrantListing, RegistrationResponse, ServiceRegistry, StatusUpdate,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    error::{ApiError, ApiResult},
    responses::{
        no_content, not_found_text, ok, ApiResponse, ArtifactResponse, ComponentHealth,
        HealthResponse,
    },
};

/// Header carrying the id of the acting user
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service registry
    pub services: Arc<ServiceRegistry>,
}

impl AppState {
    /// Create new application state
    pub fn new(services: ServiceRegistry) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

fn actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Import & Export Handlers
// ============================================================================

/// Import a model source and optionally register it
///
/// The pipeline runs on its own task so that a client disconnect does not
/// abort it halfway.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn register_models(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<RegistrationResponse>> {
    let actor = actor(&headers);
    let services = state.services.clone();

    let response = tokio::spawn(async move {
        let request = ImportRequest::from_slice(&body)?;
        info!(
            upload_type = request.source.upload_type(),
            register = request.register,
            "Importing model source"
        );
        services.import.import(request, actor).await
    })
    .await??;

    Ok(Json(response))
}

/// Export a registered model as an OCI image or gzip tarball
#[instrument(skip(state))]
pub async fn export_model(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let request = query.resolve()?;
    debug!(?request, "Resolved export request");

    match state.services.export.export(request).await? {
        ExportOutcome::Artifact(artifact) => Ok(ArtifactResponse(artifact).into_response()),
        ExportOutcome::NotFound { message } => Ok(not_found_text(message)),
    }
}

// ============================================================================
// Catalog Handlers
// ============================================================================

/// List models, one entry per name
#[instrument(skip(state))]
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ModelListing>> {
    let listing = state.services.catalog.list_models(&query).await?;
    Ok(Json(listing))
}

/// List registrants with their entity counts
#[instrument(skip(state))]
pub async fn list_registrants(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<RegistrantListing>> {
    let listing = state.services.catalog.list_registrants(&query).await?;
    Ok(Json(listing))
}

/// Update the status of an entity
#[instrument(skip(state, headers))]
pub async fn update_entity_status(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    headers: HeaderMap,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<StatusCode> {
    let entity_type = entity_type
        .parse::<EntityType>()
        .map_err(ApiError::bad_request)?;

    state
        .services
        .catalog
        .update_status(entity_type, update, actor(&headers))
        .await?;

    Ok(no_content())
}

/// Register a single component
#[instrument(skip(state, registration), fields(connection = %registration.connection.kind))]
pub async fn register_component(
    State(state): State<AppState>,
    Json(registration): Json<ComponentRegistration>,
) -> ApiResult<StatusCode> {
    state
        .services
        .catalog
        .register_component(registration)
        .await?;

    Ok(no_content())
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Health check endpoint
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> HealthResponse {
    let summary = &state.services.summary;
    if summary.latest().await.is_none() {
        summary.refresh().await;
    }

    let registry_health = match summary.latest().await {
        Some(totals) => {
            let metrics = HashMap::from([
                ("registrants".to_string(), totals.registrants.into()),
                ("models".to_string(), totals.models.into()),
                ("components".to_string(), totals.components.into()),
                ("relationships".to_string(), totals.relationships.into()),
            ]);
            ComponentHealth::healthy().with_metrics(metrics)
        }
        None => ComponentHealth::degraded("Registry summary unavailable"),
    };

    HealthResponse::healthy()
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_check("registry", registry_health)
        .compute_status()
}

// ============================================================================
// Version & Info Handlers
// ============================================================================

/// Get API version information
#[instrument]
pub async fn version_info() -> Json<ApiResponse<VersionInfo>> {
    let info = VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: "v1".to_string(),
        build_timestamp: option_env!("BUILD_TIMESTAMP")
            .unwrap_or("unknown")
            .to_string(),
    };

    Json(ok(info))
}

/// Version information
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub api_version: String,
    pub build_timestamp: String,
}
