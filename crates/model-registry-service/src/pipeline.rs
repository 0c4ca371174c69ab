//! Import pipeline
//!
//! Stages an import through its adapter, optionally registers the staged
//! packages, and reports the outcome. Staged files are dropped before the
//! response is returned on every path.

use std::sync::Arc;

use async_trait::async_trait;
use model_registry_core::{Event, EventAction, Severity};
use model_registry_store::EventPublisher;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::error::{ServiceError, ServiceResult};
use crate::events::spawn_publish;
use crate::import::{ImportRequest, Importer};
use crate::registration::{RegistrationHelper, RegistrationReport};
use crate::summary::SummaryCache;

/// Response body of an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub report: RegistrationReport,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Whether registration ran
    pub registered: bool,
}

/// Imports model sources
#[async_trait]
pub trait ImportService: Send + Sync {
    /// Run an import on behalf of `actor`
    async fn import(
        &self,
        request: ImportRequest,
        actor: Option<String>,
    ) -> ServiceResult<RegistrationResponse>;
}

/// Default import pipeline
pub struct DefaultImportService {
    importer: Importer,
    registration: RegistrationHelper,
    publisher: Arc<dyn EventPublisher>,
    summary: Arc<SummaryCache>,
}

impl DefaultImportService {
    pub fn new(
        importer: Importer,
        registration: RegistrationHelper,
        publisher: Arc<dyn EventPublisher>,
        summary: Arc<SummaryCache>,
    ) -> Self {
        Self {
            importer,
            registration,
            publisher,
            summary,
        }
    }

    fn publish(&self, actor: &Option<String>, severity: Severity, description: String) {
        if let Some(actor) = actor {
            let event = Event::builder(EventAction::Register)
                .severity(severity)
                .actor(actor.clone())
                .description(description)
                .build();
            spawn_publish(&self.publisher, event);
        }
    }

    fn publish_error(&self, actor: &Option<String>, description: String, err: &ServiceError) {
        error!(error = %err, "{}", description);
        if let Some(actor) = actor {
            let event = Event::builder(EventAction::Register)
                .severity(Severity::Error)
                .actor(actor.clone())
                .description(description)
                .metadata("error", err.to_string())
                .build();
            spawn_publish(&self.publisher, event);
        }
    }
}

#[async_trait]
impl ImportService for DefaultImportService {
    #[instrument(
        skip(self, request, actor),
        fields(upload_type = request.source.upload_type(), register = request.register)
    )]
    async fn import(
        &self,
        request: ImportRequest,
        actor: Option<String>,
    ) -> ServiceResult<RegistrationResponse> {
        let upload_type = request.source.upload_type();

        let staged = match self.importer.stage(&request.source).await {
            Ok(staged) => staged,
            Err(e) => {
                self.publish_error(&actor, format!("Failed to import {} source", upload_type), &e);
                return Err(e);
            }
        };
        self.publish(&actor, Severity::Informational, staged.description.clone());

        if !request.register {
            info!(description = %staged.description, "Import staged without registration");
            return Ok(RegistrationResponse {
                report: RegistrationReport::default(),
                message: staged.description.clone(),
                error_message: None,
                registered: false,
            });
        }

        let result = self.registration.register(staged.dirs.clone()).await;
        drop(staged);

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                self.publish_error(&actor, "Failed to register imported models".to_string(), &e);
                return Err(e);
            }
        };
        self.summary.spawn_refresh();

        let message = report.summary_message();
        let error_message = report.error_message();
        self.publish(&actor, Severity::Informational, message.clone());
        if let Some(ref details) = error_message {
            self.publish(&actor, Severity::Error, details.clone());
        }

        Ok(RegistrationResponse {
            report,
            message,
            error_message,
            registered: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::pack_tar_gz;
    use crate::import::{FileImport, ImportSource};
    use crate::{PipelineConfig, ServiceRegistry, ServiceRegistryBuilder};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use model_registry_core::layout::versioned_dir;
    use model_registry_core::{ComponentDefinition, Entity, ModelDefinition, OutputFormat, PackagePaths};
    use model_registry_store::{
        BroadcastEventPublisher, EntityFilter, InMemoryRegistry, ModelFilter, RegistryManager,
    };
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        registry: Arc<InMemoryRegistry>,
        publisher: Arc<BroadcastEventPublisher>,
        services: ServiceRegistry,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        let publisher = Arc::new(BroadcastEventPublisher::new(16));
        let services = ServiceRegistryBuilder::new()
            .registry(registry.clone())
            .publisher(publisher.clone())
            .config(PipelineConfig::rooted_at(root.path()))
            .build()
            .unwrap();
        Fixture {
            root,
            registry,
            publisher,
            services,
        }
    }

    fn archive_request(register: bool) -> ImportRequest {
        let tree = TempDir::new().unwrap();
        let model = ModelDefinition::new("argo")
            .with_model_version("v3.5.0")
            .with_registrant("github");
        let paths = PackagePaths::new(
            versioned_dir(tree.path(), "argo", "v3.5.0", "v1.0.0"),
            OutputFormat::Json,
        );
        paths.create_dirs().unwrap();
        paths
            .write_entity(&Entity::Model(model), OutputFormat::Json)
            .unwrap();
        paths
            .write_entity(
                &Entity::Component(ComponentDefinition::new("Workflow", "{}")),
                OutputFormat::Json,
            )
            .unwrap();

        ImportRequest {
            register,
            source: ImportSource::File(FileImport {
                model_file: STANDARD.encode(pack_tar_gz(tree.path()).unwrap()),
                file_name: "argo.tar.gz".to_string(),
            }),
        }
    }

    async fn model_count(registry: &InMemoryRegistry) -> i64 {
        registry
            .get_entities(&EntityFilter::Model(ModelFilter::new()))
            .await
            .unwrap()
            .count
    }

    fn temp_entries(root: &TempDir) -> usize {
        fs::read_dir(root.path().join("tmp"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_import_and_register() {
        let f = fixture();
        let mut rx = f.publisher.subscribe();

        let response = f
            .services
            .import
            .import(archive_request(true), Some("user-1".to_string()))
            .await
            .unwrap();

        assert!(response.registered);
        assert_eq!(response.report.total_count, 2);
        assert_eq!(response.report.err_count, 0);
        assert_eq!(
            response.message,
            "Registered 1 model(s), 1 component(s) and 0 relationship(s) for argo"
        );
        assert_eq!(model_count(&f.registry).await, 1);
        assert_eq!(temp_entries(&f.root), 0);

        let mut descriptions = vec![
            rx.recv().await.unwrap().description,
            rx.recv().await.unwrap().description,
        ];
        descriptions.sort();
        assert_eq!(
            descriptions,
            vec![response.message.clone(), "Staged file argo.tar.gz".to_string()]
        );
    }

    #[tokio::test]
    async fn test_import_without_register_leaves_registry_untouched() {
        let f = fixture();

        let response = f
            .services
            .import
            .import(archive_request(false), None)
            .await
            .unwrap();

        assert!(!response.registered);
        assert_eq!(response.report.total_count, 0);
        assert_eq!(model_count(&f.registry).await, 0);
        assert_eq!(temp_entries(&f.root), 0);
    }

    #[tokio::test]
    async fn test_failed_staging_publishes_error_event() {
        let f = fixture();
        let mut rx = f.publisher.subscribe();

        let request = ImportRequest {
            register: true,
            source: ImportSource::File(FileImport {
                model_file: "not base64!".to_string(),
                file_name: "m.json".to_string(),
            }),
        };
        let err = f
            .services
            .import
            .import(request, Some("user-1".to_string()))
            .await
            .unwrap_err();
        assert!(err.is_client_error());

        let event = rx.recv().await.unwrap();
        assert!(event.is_error());
        assert_eq!(event.description, "Failed to import file source");
    }

    #[test]
    fn test_response_serialization() {
        let response = RegistrationResponse {
            report: RegistrationReport::default(),
            message: "No entities found to register".to_string(),
            error_message: None,
            registered: true,
        };
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["totalCount"], 0);
        assert_eq!(body["errCount"], 0);
        assert_eq!(body["registered"], true);
        assert!(body.get("errorMessage").is_none());
    }
}
