//! API route definitions
//!
//! This module defines all API routes and builds the router.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    export_model, health_check, list_models, list_registrants, register_component,
    register_models, update_entity_status, version_info, AppState,
};

/// Build the API router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_info))
        // API v1 routes
        .nest("/v1", build_v1_routes())
        .with_state(state)
}

/// Build v1 API routes
fn build_v1_routes() -> Router<AppState> {
    Router::new()
        // Models
        .route("/models", get(list_models))
        .route("/models/register", post(register_models))
        .route("/models/export", get(export_model))
        // Registrants
        .route("/registrants", get(list_registrants))
        // Entities
        .route("/entities/:entity_type/status", post(update_entity_status))
        .route("/components/register", post(register_component))
}
