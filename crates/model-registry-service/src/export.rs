//! Export packager
//!
//! Rebuilds the package tree of a registered model in a scratch directory and
//! serializes it as an OCI image tar or a gzip tarball.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use model_registry_core::layout::versioned_dir;
use model_registry_core::{Entity, ModelDefinition, OutputFormat, PackagePaths};
use model_registry_store::{ModelFilter, RegistryManager};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::archive::{build_oci_layout, pack_tar, pack_tar_gz};
use crate::config::PipelineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::svg::SvgStore;

pub const CONTENT_TYPE_TAR: &str = "application/x-tar";
pub const CONTENT_TYPE_GZIP: &str = "application/gzip";

/// Raw export query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub output_format: Option<String>,
    pub file_type: Option<String>,
    pub components: Option<String>,
    pub relationships: Option<String>,
}

/// Resolve an optional boolean query flag, defaulting to `true`
///
/// An absent flag and an unparsable one both resolve to `true`; only the
/// latter is logged as a warning.
pub fn resolve_include_flag(name: &str, value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => {
            debug!(flag = name, "Flag not set, including by default");
            true
        }
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                warn!(flag = name, value = raw, "Invalid boolean flag, including by default");
                true
            }
        },
    }
}

/// Packaging of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageFileType {
    #[default]
    Oci,
    Gzip,
}

impl FromStr for PackageFileType {
    type Err = ServiceError;

    /// `oci` (or nothing) selects an OCI image, anything else a gzip tarball
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "oci" => Ok(Self::Oci),
            _ => Ok(Self::Gzip),
        }
    }
}

/// A resolved export request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub output_format: OutputFormat,
    pub file_type: PackageFileType,
    pub include_components: bool,
    pub include_relationships: bool,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ExportQuery {
    /// Apply defaults and validate the enumerated parameters
    pub fn resolve(&self) -> ServiceResult<ExportRequest> {
        let output_format = match non_empty(&self.output_format) {
            Some(raw) => raw.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        };
        let file_type = match non_empty(&self.file_type) {
            Some(raw) => raw.parse::<PackageFileType>()?,
            None => PackageFileType::default(),
        };

        Ok(ExportRequest {
            id: non_empty(&self.id),
            name: non_empty(&self.name),
            version: non_empty(&self.version),
            output_format,
            file_type,
            include_components: resolve_include_flag("components", self.components.as_deref()),
            include_relationships: resolve_include_flag(
                "relationships",
                self.relationships.as_deref(),
            ),
        })
    }
}

impl ExportRequest {
    /// Message of a not-found outcome, naming every supplied selector
    pub fn not_found_message(&self) -> String {
        let selectors: Vec<String> = [("id", &self.id), ("name", &self.name), ("version", &self.version)]
            .into_iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{} {}", label, v)))
            .collect();

        if selectors.is_empty() {
            "model has not been found".to_string()
        } else {
            format!("model with {} has not been found", selectors.join(" "))
        }
    }

    fn filter(&self) -> ModelFilter {
        let mut filter = ModelFilter::new()
            .greedy(true)
            .with_components(self.include_components)
            .with_relationships(self.include_relationships);
        if let Some(ref id) = self.id {
            filter = filter.id(id);
        }
        if let Some(ref name) = self.name {
            filter = filter.name(name);
        }
        if let Some(ref version) = self.version {
            filter = filter.version(version);
        }
        filter
    }
}

/// Packaged model bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Result of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Artifact(ExportArtifact),
    NotFound { message: String },
}

/// Exports registered models
#[async_trait]
pub trait ExportService: Send + Sync {
    async fn export(&self, request: ExportRequest) -> ServiceResult<ExportOutcome>;
}

/// Default exporter reading from the registry
pub struct Exporter {
    registry: Arc<dyn RegistryManager>,
    svg_store: Arc<dyn SvgStore>,
    config: Arc<PipelineConfig>,
}

impl Exporter {
    pub fn new(
        registry: Arc<dyn RegistryManager>,
        svg_store: Arc<dyn SvgStore>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            registry,
            svg_store,
            config,
        }
    }
}

/// Write the package tree of `model` under `paths`
fn write_package(
    mut model: ModelDefinition,
    paths: &PackagePaths,
    format: OutputFormat,
) -> ServiceResult<()> {
    paths.create_dirs()?;

    let components = model.components.take().unwrap_or_default();
    let relationships = model.relationships.take().unwrap_or_default();
    let header = model.stripped();

    paths.write_entity(&Entity::Model(model), format)?;
    for mut component in components {
        component.model = header.clone();
        paths.write_entity(&Entity::Component(component), format)?;
    }
    for mut relationship in relationships {
        relationship.model = header.clone();
        paths.write_entity(&Entity::Relationship(relationship), format)?;
    }
    Ok(())
}

/// Write the versioned package tree of `model` under `root` and package it
fn package_model(
    model: ModelDefinition,
    root: &Path,
    file_type: PackageFileType,
    format: OutputFormat,
) -> ServiceResult<ExportArtifact> {
    let name = model.name.clone();
    let version = model.model.version.clone();
    let tree = root.join("package");
    let paths = PackagePaths::new(
        versioned_dir(&tree, &name, &version, &model.version),
        format,
    );
    write_package(model, &paths, format)?;

    let (file, content_type, filename) = match file_type {
        PackageFileType::Oci => {
            let layout = root.join("oci");
            build_oci_layout(&tree, &layout, &name, &version)?;
            let file = root.join("model.tar");
            fs::write(&file, pack_tar(&layout)?)?;
            (file, CONTENT_TYPE_TAR, format!("{}.tar", name))
        }
        PackageFileType::Gzip => {
            let file = root.join("model.tar.gz");
            fs::write(&file, pack_tar_gz(&tree)?)?;
            (file, CONTENT_TYPE_GZIP, format!("{}.tar.gz", name))
        }
    };

    Ok(ExportArtifact {
        bytes: fs::read(file)?,
        content_type,
        filename,
    })
}

fn inline_svgs(store: &dyn SvgStore, model: &mut ModelDefinition) {
    if let Err(e) = store.inline_model(model) {
        warn!(model = %model.name, error = %e, "Failed to inline model SVGs");
    }
    for component in model.components.iter_mut().flatten() {
        if let Err(e) = store.inline_component(component) {
            warn!(component = %component.component.kind, error = %e, "Failed to inline component SVGs");
        }
    }
}

#[async_trait]
impl ExportService for Exporter {
    #[instrument(skip(self, request), fields(id = ?request.id, name = ?request.name))]
    async fn export(&self, request: ExportRequest) -> ServiceResult<ExportOutcome> {
        let page = self.registry.get_entities(&request.filter().into()).await?;

        let model = page.entities.into_iter().find_map(|entity| match entity {
            Entity::Model(model) => Some(model),
            _ => None,
        });
        let Some(mut model) = model else {
            let message = request.not_found_message();
            debug!(message = %message, "Export target not found");
            return Ok(ExportOutcome::NotFound { message });
        };

        let scratch = self.config.scratch_dir("export-")?;
        let svg_store = self.svg_store.clone();
        let file_type = request.file_type;
        let format = request.output_format;

        // The scratch dir moves into the blocking task so a dropped request
        // cannot remove it while files are still being written.
        let artifact = tokio::task::spawn_blocking(move || {
            inline_svgs(svg_store.as_ref(), &mut model);
            let artifact = package_model(model, scratch.path(), file_type, format);
            drop(scratch);
            artifact
        })
        .await??;

        info!(
            filename = %artifact.filename,
            bytes = artifact.bytes.len(),
            "Exported model"
        );
        Ok(ExportOutcome::Artifact(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{extract_oci_layers, unpack_bytes};
    use crate::svg::FsSvgStore;
    use model_registry_core::layout::entity_files;
    use model_registry_core::{ComponentDefinition, ComponentStyles, RelationshipDefinition};
    use model_registry_store::InMemoryRegistry;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const COMPONENTS: [(&str, &str); 3] = [
        ("Workflow", "argoproj.io/v1alpha1"),
        ("Workflow", "argoproj.io/v1"),
        ("CronWorkflow", "argoproj.io/v1alpha1"),
    ];

    async fn seeded() -> (TempDir, Arc<InMemoryRegistry>, Exporter) {
        let root = TempDir::new().unwrap();
        let config = Arc::new(PipelineConfig::rooted_at(root.path()));
        let registry = Arc::new(InMemoryRegistry::new());

        let model = ModelDefinition::new("argo")
            .with_model_version("v3.5.0")
            .with_registrant("github");
        let connection = model.registrant.clone();
        registry
            .register_entity(&connection, &Entity::Model(model.clone()))
            .await
            .unwrap();
        for (kind, api_version) in COMPONENTS {
            let mut component = ComponentDefinition::new(kind, r#"{"type":"object"}"#)
                .with_api_version(api_version)
                .with_model(model.stripped());
            component.styles = Some(ComponentStyles {
                primary_color: "#EF7B4D".to_string(),
                ..Default::default()
            });
            registry
                .register_entity(&connection, &Entity::Component(component))
                .await
                .unwrap();
        }
        let relationship =
            RelationshipDefinition::new("edge", "binding", "mount").with_model(model.stripped());
        registry
            .register_entity(&connection, &Entity::Relationship(relationship))
            .await
            .unwrap();

        let exporter = Exporter::new(
            registry.clone(),
            Arc::new(FsSvgStore::new(config.svg_asset_root.clone())),
            config,
        );
        (root, registry, exporter)
    }

    /// The registered model with its components and relationships inlined
    async fn registered(registry: &InMemoryRegistry) -> ModelDefinition {
        let filter = ModelFilter::new()
            .name("argo")
            .with_components(true)
            .with_relationships(true);
        let page = registry.get_entities(&filter.into()).await.unwrap();
        let Some(Entity::Model(model)) = page.entities.into_iter().next() else {
            panic!("expected the registered model");
        };
        model
    }

    fn query(pairs: &[(&str, &str)]) -> ExportRequest {
        let mut query = ExportQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "id" => query.id = value,
                "name" => query.name = value,
                "file_type" => query.file_type = value,
                "output_format" => query.output_format = value,
                "components" => query.components = value,
                _ => unreachable!(),
            }
        }
        query.resolve().unwrap()
    }

    async fn artifact(exporter: &Exporter, pairs: &[(&str, &str)]) -> ExportArtifact {
        match exporter.export(query(pairs)).await.unwrap() {
            ExportOutcome::Artifact(artifact) => artifact,
            ExportOutcome::NotFound { message } => panic!("unexpected not found: {}", message),
        }
    }

    /// Package directory of the seeded model below an unpacked tree
    fn package_root(tree: &Path, model: &ModelDefinition) -> PathBuf {
        versioned_dir(tree, &model.name, &model.model.version, &model.version)
    }

    #[test]
    fn test_resolve_include_flag() {
        assert!(resolve_include_flag("components", None));
        assert!(resolve_include_flag("components", Some("TRUE")));
        assert!(!resolve_include_flag("components", Some("false")));
        assert!(resolve_include_flag("components", Some("nope")));
    }

    #[test]
    fn test_not_found_message_names_selectors() {
        let request = ExportRequest {
            id: Some("42".to_string()),
            name: Some("argo".to_string()),
            version: Some("v1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            request.not_found_message(),
            "model with id 42 name argo version v1 has not been found"
        );
    }

    #[test]
    fn test_query_defaults() {
        let request = ExportQuery::default().resolve().unwrap();
        assert_eq!(request.file_type, PackageFileType::Oci);
        assert_eq!(request.output_format, OutputFormat::Json);
        assert!(request.include_components && request.include_relationships);
    }

    #[test]
    fn test_any_other_file_type_is_gzip() {
        for raw in ["gzip", "tar", "zip", "anything"] {
            assert_eq!(raw.parse::<PackageFileType>().unwrap(), PackageFileType::Gzip);
        }
        assert_eq!(" OCI ".parse::<PackageFileType>().unwrap(), PackageFileType::Oci);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (_root, _, exporter) = seeded().await;
        let id = "00000000-0000-0000-0000-000000000042";
        let outcome = exporter.export(query(&[("id", id)])).await.unwrap();
        let ExportOutcome::NotFound { message } = outcome else {
            panic!("expected not found");
        };
        assert_eq!(message, format!("model with id {} has not been found", id));
    }

    #[tokio::test]
    async fn test_oci_export_round_trip() {
        let (root, registry, exporter) = seeded().await;
        let original = registered(&registry).await;

        let artifact = artifact(&exporter, &[("name", "argo")]).await;
        assert_eq!(artifact.content_type, CONTENT_TYPE_TAR);
        assert_eq!(artifact.filename, "argo.tar");

        let out = TempDir::new().unwrap();
        unpack_bytes(&artifact.bytes, &out.path().join("layout")).unwrap();
        extract_oci_layers(&out.path().join("layout"), &out.path().join("pkg")).unwrap();

        let package = package_root(&out.path().join("pkg"), &original);
        let paths = PackagePaths::new(&package, OutputFormat::Json);

        let Entity::Model(model) = Entity::decode_file(&paths.model_file).unwrap() else {
            panic!("expected a model");
        };
        assert_eq!(model, original.stripped());

        // Every component comes back equal to the registered one
        let components = entity_files(&paths.components_dir).unwrap();
        assert_eq!(components.len(), COMPONENTS.len());
        let registered_components = original.components.clone().unwrap();
        for file in &components {
            let Entity::Component(component) = Entity::decode_file(file).unwrap() else {
                panic!("expected a component");
            };
            assert!(component.model.components.is_none());
            let mut expected = registered_components
                .iter()
                .find(|c| c.id == component.id)
                .cloned()
                .unwrap();
            expected.model = original.stripped();
            assert_eq!(component, expected);
        }

        let relationships = entity_files(&paths.relationships_dir).unwrap();
        assert_eq!(relationships.len(), 1);
        let Entity::Relationship(relationship) = Entity::decode_file(&relationships[0]).unwrap()
        else {
            panic!("expected a relationship");
        };
        let mut expected = original.relationships.clone().unwrap().remove(0);
        expected.model = original.stripped();
        assert_eq!(relationship, expected);

        // Scratch space is gone once the export returns
        assert_eq!(fs::read_dir(root.path().join("tmp")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_oci_export_honours_output_format() {
        let (_root, registry, exporter) = seeded().await;
        let original = registered(&registry).await;

        let artifact = artifact(&exporter, &[("name", "argo"), ("output_format", "yaml")]).await;
        assert_eq!(artifact.content_type, CONTENT_TYPE_TAR);

        let out = TempDir::new().unwrap();
        unpack_bytes(&artifact.bytes, &out.path().join("layout")).unwrap();
        extract_oci_layers(&out.path().join("layout"), &out.path().join("pkg")).unwrap();

        let paths = PackagePaths::new(
            package_root(&out.path().join("pkg"), &original),
            OutputFormat::Yaml,
        );
        assert!(paths.model_file.is_file());
        let components = entity_files(&paths.components_dir).unwrap();
        assert_eq!(components.len(), COMPONENTS.len());
        assert!(components
            .iter()
            .all(|p| p.extension().is_some_and(|ext| ext == "yaml")));
    }

    #[tokio::test]
    async fn test_gzip_export_keeps_versioned_layout() {
        let (_root, registry, exporter) = seeded().await;
        let original = registered(&registry).await;

        let artifact = artifact(
            &exporter,
            &[("name", "arg"), ("file_type", "tar"), ("components", "false")],
        )
        .await;
        assert_eq!(artifact.content_type, CONTENT_TYPE_GZIP);
        assert_eq!(artifact.filename, "argo.tar.gz");

        let out = TempDir::new().unwrap();
        unpack_bytes(&artifact.bytes, out.path()).unwrap();
        let package = package_root(out.path(), &original);
        assert_eq!(
            package,
            out.path().join("argo").join("v3.5.0").join(&original.version)
        );

        let paths = PackagePaths::new(&package, OutputFormat::Json);
        assert!(paths.model_file.is_file());
        assert!(!out.path().join("model.json").exists());
        assert!(entity_files(&paths.components_dir).unwrap().is_empty());
        assert_eq!(entity_files(&paths.relationships_dir).unwrap().len(), 1);
    }

    #[test]
    fn test_package_model_writes_every_same_kind_component() {
        let root = TempDir::new().unwrap();
        let mut model = ModelDefinition::new("cert-manager").with_model_version("v1.13.0");
        model.components = Some(
            ["cert-manager.io/v1", "cert-manager.io/v1beta1"]
                .into_iter()
                .map(|version| ComponentDefinition::new("Issuer", "{}").with_api_version(version))
                .collect(),
        );

        let artifact =
            package_model(model, root.path(), PackageFileType::Gzip, OutputFormat::Json).unwrap();

        let out = TempDir::new().unwrap();
        unpack_bytes(&artifact.bytes, out.path()).unwrap();
        let components_dir = out
            .path()
            .join("cert-manager")
            .join("v1.13.0")
            .join(ModelDefinition::default().version)
            .join(model_registry_core::COMPONENTS_DIR);
        assert_eq!(entity_files(&components_dir).unwrap().len(), 2);
    }
}
