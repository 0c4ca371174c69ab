//! Registry contract for the model registry
//!
//! This crate defines how the services reach the backing registry:
//! - The `RegistryManager` trait for entity lookup, registration, status
//!   updates and registrant listing
//! - Query filters with greedy name matching and pagination
//! - `InMemoryRegistry`, a process-local implementation
//! - The `EventPublisher` trait and a broadcast-channel publisher
//!
//! # Example
//!
//! ```rust,no_run
//! use model_registry_core::{Connection, Entity, ModelDefinition};
//! use model_registry_store::{InMemoryRegistry, ModelFilter, RegistryManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = InMemoryRegistry::new();
//! let model = ModelDefinition::new("cert-manager");
//! registry
//!     .register_entity(&Connection::new("github"), &Entity::Model(model))
//!     .await?;
//!
//! let page = registry
//!     .get_entities(&ModelFilter::new().name("cert").greedy(true).into())
//!     .await?;
//! assert_eq!(page.count, 1);
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use model_registry_core;

pub mod error;
pub mod filter;
pub mod memory;
pub mod publisher;
pub mod registry;

pub use error::{EntityRegistrationError, StoreError, StoreResult};
pub use filter::{
    ComponentFilter, EntityFilter, ModelFilter, Pagination, RegistrantFilter, SortOrder,
};
pub use memory::InMemoryRegistry;
pub use publisher::{BroadcastEventPublisher, EventPublisher, DEFAULT_EVENT_CAPACITY};
pub use registry::{EntityPage, RegistrantSummary, RegistryManager, RegistrySummary};
