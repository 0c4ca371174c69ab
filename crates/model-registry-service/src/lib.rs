//! Service layer for the model registry
//!
//! This crate sits between the HTTP surface and the registry store. It turns
//! external model sources into registry entities and registered models back
//! into distributable artifacts.
//!
//! # Architecture
//!
//! - **Import adapters** ([`import`]): spreadsheet, URL scaffold, uploaded file
//!   and remote archive sources, each staged into the package layout
//! - **RegistrationHelper** ([`registration`]): concurrent registration of
//!   staged packages with an aggregated report
//! - **ImportService** ([`pipeline`]): staging, registration and audit events
//! - **ExportService** ([`export`]): OCI image or gzip tarball packaging
//! - **CatalogService** ([`catalog`]): listings, status updates and single
//!   component registration
//!
//! # Example
//!
//! ```rust,no_run
//! use model_registry_service::{PipelineConfig, ServiceRegistryBuilder};
//! use model_registry_store::{BroadcastEventPublisher, InMemoryRegistry};
//! use std::sync::Arc;
//!
//! # fn example() -> model_registry_service::ServiceResult<()> {
//! let services = ServiceRegistryBuilder::new()
//!     .registry(Arc::new(InMemoryRegistry::new()))
//!     .publisher(Arc::new(BroadcastEventPublisher::default()))
//!     .config(PipelineConfig::default())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod import;
pub mod pipeline;
pub mod registration;
pub mod summary;
pub mod svg;

// Re-export main types for convenience
pub use config::PipelineConfig;
pub use error::{ServiceError, ServiceResult};

pub use catalog::{
    CatalogService, ComponentRegistration, DefaultCatalogService, ListQuery, ModelListing,
    RegistrantListing, StatusUpdate,
};
pub use export::{
    ExportArtifact, ExportOutcome, ExportQuery, ExportRequest, ExportService, Exporter,
    PackageFileType,
};
pub use import::{ImportRequest, ImportSource, Importer, StagedImport};
pub use pipeline::{DefaultImportService, ImportService, RegistrationResponse};
pub use registration::{Dir, FailureKind, RegistrationHelper, RegistrationReport};
pub use summary::SummaryCache;
pub use svg::{FsSvgStore, SvgStore};

use import::{
    CsvImportAdapter, CsvSheetGenerator, FileImportAdapter, HttpPackageGenerator,
    PackageGenerator, RemoteArchiveAdapter, SheetGenerator, UrlImportAdapter,
};
use model_registry_store::{EventPublisher, RegistryManager};
use std::sync::Arc;

/// Service registry that holds all service instances
#[derive(Clone)]
pub struct ServiceRegistry {
    /// Import pipeline
    pub import: Arc<dyn ImportService>,
    /// Export packager
    pub export: Arc<dyn ExportService>,
    /// Listings, status updates and component registration
    pub catalog: Arc<dyn CatalogService>,
    /// Cached registry totals
    pub summary: Arc<SummaryCache>,
    pub config: Arc<PipelineConfig>,
}

impl ServiceRegistry {
    /// Create a service registry with custom implementations
    pub fn with_services(
        import: Arc<dyn ImportService>,
        export: Arc<dyn ExportService>,
        catalog: Arc<dyn CatalogService>,
        summary: Arc<SummaryCache>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            import,
            export,
            catalog,
            summary,
            config,
        }
    }

    pub fn import(&self) -> &Arc<dyn ImportService> {
        &self.import
    }

    pub fn export(&self) -> &Arc<dyn ExportService> {
        &self.export
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogService> {
        &self.catalog
    }
}

/// Builder for ServiceRegistry
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    registry: Option<Arc<dyn RegistryManager>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    config: Option<PipelineConfig>,
    sheet_generator: Option<Arc<dyn SheetGenerator>>,
    package_generator: Option<Arc<dyn PackageGenerator>>,
    svg_store: Option<Arc<dyn SvgStore>>,
}

impl ServiceRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing registry
    pub fn registry(mut self, registry: Arc<dyn RegistryManager>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the audit event sink
    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Set the pipeline configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom spreadsheet generator
    pub fn sheet_generator(mut self, generator: Arc<dyn SheetGenerator>) -> Self {
        self.sheet_generator = Some(generator);
        self
    }

    /// Set a custom URL package generator
    pub fn package_generator(mut self, generator: Arc<dyn PackageGenerator>) -> Self {
        self.package_generator = Some(generator);
        self
    }

    /// Set a custom SVG store
    pub fn svg_store(mut self, store: Arc<dyn SvgStore>) -> Self {
        self.svg_store = Some(store);
        self
    }

    /// Build the service registry
    ///
    /// Defaults are created for every collaborator not set explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or publisher is not set, or the HTTP
    /// client cannot be built.
    pub fn build(self) -> ServiceResult<ServiceRegistry> {
        let registry = self
            .registry
            .ok_or_else(|| ServiceError::Internal("Registry is required".to_string()))?;
        let publisher = self
            .publisher
            .ok_or_else(|| ServiceError::Internal("Event publisher is required".to_string()))?;
        let config = Arc::new(self.config.unwrap_or_default());

        let client = reqwest::Client::builder()
            .timeout(config.download_timeout())
            .build()?;

        let sheet_generator = self
            .sheet_generator
            .unwrap_or_else(|| Arc::new(CsvSheetGenerator::new()));
        let package_generator = self
            .package_generator
            .unwrap_or_else(|| Arc::new(HttpPackageGenerator::new(client.clone())));
        let svg_store = self
            .svg_store
            .unwrap_or_else(|| Arc::new(FsSvgStore::new(config.svg_asset_root.clone())));

        let summary = Arc::new(SummaryCache::new(registry.clone()));

        let importer = Importer::new(
            CsvImportAdapter::new(sheet_generator, config.clone()),
            UrlImportAdapter::new(package_generator, config.clone()),
            FileImportAdapter::new(config.clone()),
            RemoteArchiveAdapter::new(client, config.clone()),
        );
        let import = Arc::new(DefaultImportService::new(
            importer,
            RegistrationHelper::new(registry.clone(), config.clone()),
            publisher.clone(),
            summary.clone(),
        ));

        let export = Arc::new(Exporter::new(
            registry.clone(),
            svg_store.clone(),
            config.clone(),
        ));

        let catalog = Arc::new(DefaultCatalogService::new(
            registry,
            publisher,
            svg_store,
            summary.clone(),
        ));

        Ok(ServiceRegistry {
            import,
            export,
            catalog,
            summary,
            config,
        })
    }
}
