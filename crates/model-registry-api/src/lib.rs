//! Model Registry API Layer
//!
//! This crate provides the REST API layer for the model registry using Axum.
//! It includes request handlers, middleware, error handling, and response types.
//!
//! # Routes
//!
//! - `POST /v1/models/register`: import a model source, optionally registering it
//! - `GET /v1/models/export`: package a registered model
//! - `GET /v1/models`, `GET /v1/registrants`: paged listings
//! - `POST /v1/entities/:entity_type/status`: status update
//! - `POST /v1/components/register`: single component registration
//! - `GET /health`, `GET /version`
//!
//! # Example
//!
//! ```rust,no_run
//! use model_registry_api::build_api_server;
//! use model_registry_service::ServiceRegistry;
//!
//! # async fn example(services: ServiceRegistry) {
//! let app = build_api_server(services);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, app).await.unwrap();
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routes;

// Re-export main types for convenience
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::{AppState, VersionInfo, USER_ID_HEADER};
pub use middleware::{CorsConfig, MiddlewareConfig, UuidRequestIdGenerator};
pub use responses::{ApiResponse, ComponentHealth, HealthResponse, HealthStatus};
pub use routes::build_router;

use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use model_registry_service::ServiceRegistry;
use tower_http::{
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

/// Build a complete API server with the default middleware
pub fn build_api_server(services: ServiceRegistry) -> Router {
    build_api_server_with_config(services, MiddlewareConfig::default())
}

/// Build API server with custom middleware configuration
///
/// # Example
///
/// ```rust,no_run
/// use model_registry_api::{build_api_server_with_config, MiddlewareConfig};
/// use model_registry_service::ServiceRegistry;
///
/// # async fn example(services: ServiceRegistry) {
/// let middleware_config = MiddlewareConfig::new()
///     .with_compression(true)
///     .with_timeout(60);
///
/// let app = build_api_server_with_config(services, middleware_config);
/// # }
/// ```
pub fn build_api_server_with_config(
    services: ServiceRegistry,
    middleware_config: MiddlewareConfig,
) -> Router {
    let state = AppState::new(services);
    let mut router = build_router(state)
        .layer(DefaultBodyLimit::max(middleware_config.max_body_bytes))
        .layer(middleware_config.cors.into_layer());

    if middleware_config.enable_compression {
        router = router.layer(CompressionLayer::new());
    }

    if let Some(seconds) = middleware_config.request_timeout_seconds {
        router = router.layer(TimeoutLayer::new(Duration::from_secs(seconds)));
    }

    if middleware_config.enable_tracing {
        router = router.layer(middleware::trace_layer());
    }

    // Request ID generation
    router
        .layer(SetRequestIdLayer::x_request_id(
            UuidRequestIdGenerator::default(),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
}
