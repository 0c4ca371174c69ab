//! URL scaffold adapter
//!
//! Builds a model package from a source URL plus inline model metadata.

use std::sync::Arc;

use async_trait::async_trait;
use model_registry_core::layout::{entity_files, versioned_dir};
use model_registry_core::{
    Category, ComponentDefinition, ComponentSpec, ComponentStyles, Entity, ModelDefinition,
    ModelMetadata, OutputFormat, PackagePaths, DEFAULT_DEFINITION_VERSION, UNCATEGORIZED,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{StagedImport, UrlImport, UrlModelMetadata, DEFAULT_MODEL_VERSION};
use crate::config::PipelineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::registration::Dir;

/// Label a CRD carries its content version under
pub const CRD_VERSION_LABEL: &str = "app.kubernetes.io/version";

const DEFAULT_PRIMARY_COLOR: &str = "#00B39F";
const DEFAULT_SECONDARY_COLOR: &str = "#00D3A9";
const DEFAULT_SHAPE: &str = "circle";
const DEFAULT_REGISTRANT: &str = "github";

fn set_default(field: &mut String, default: &str) {
    if field.trim().is_empty() {
        *field = default.to_string();
    }
}

impl UrlModelMetadata {
    /// Fill unset fields and lower-case the model name
    pub fn apply_defaults(&mut self) {
        self.model = self.model.trim().to_lowercase();
        set_default(&mut self.primary_color, DEFAULT_PRIMARY_COLOR);
        set_default(&mut self.secondary_color, DEFAULT_SECONDARY_COLOR);
        set_default(&mut self.shape, DEFAULT_SHAPE);
        set_default(&mut self.category, UNCATEGORIZED);
        set_default(&mut self.sub_category, UNCATEGORIZED);
        set_default(&mut self.registrant, DEFAULT_REGISTRANT);
        let name = self.model.clone();
        set_default(&mut self.model_display_name, &name);
    }

    /// Model definition for the given content version
    pub fn to_model_definition(&self, model_version: &str) -> ModelDefinition {
        let mut model = ModelDefinition::new(&self.model)
            .with_model_version(model_version)
            .with_registrant(&self.registrant)
            .with_display_name(&self.model_display_name);
        model.category = Category {
            name: self.category.clone(),
        };
        model.sub_category = self.sub_category.clone();
        model.metadata = ModelMetadata {
            primary_color: self.primary_color.clone(),
            secondary_color: self.secondary_color.clone(),
            shape: self.shape.clone(),
            svg_color: self.svg_color.clone(),
            svg_white: self.svg_white.clone(),
            svg_complete: self.svg_complete.clone(),
            is_annotation: self.is_annotation,
            publish_to_registry: self.publish_to_registry,
        };
        model
    }

    fn component_styles(&self) -> ComponentStyles {
        ComponentStyles {
            primary_color: self.primary_color.clone(),
            secondary_color: self.secondary_color.clone(),
            shape: self.shape.clone(),
            svg_color: self.svg_color.clone(),
            svg_white: self.svg_white.clone(),
            svg_complete: self.svg_complete.clone(),
        }
    }
}

/// Content resolved from a source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPackage {
    /// Content version of the model
    pub version: String,
    pub components: Vec<ComponentSpec>,
}

/// Resolves a source URL into component specs
#[async_trait]
pub trait PackageGenerator: Send + Sync {
    async fn generate(
        &self,
        registrant: &str,
        url: &str,
        model_name: &str,
    ) -> ServiceResult<GeneratedPackage>;
}

#[derive(Debug, Deserialize)]
struct CrdNames {
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrdVersion {
    name: String,
    #[serde(default = "served_default")]
    served: bool,
    #[serde(default)]
    schema: Option<Value>,
}

fn served_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CrdSpec {
    group: String,
    names: CrdNames,
    #[serde(default)]
    versions: Vec<CrdVersion>,
}

/// Extract component specs from one manifest document
///
/// Returns the components of a CustomResourceDefinition and its version label.
fn components_from_document(doc: &Value) -> Option<(Vec<ComponentSpec>, Option<String>)> {
    if doc.get("kind").and_then(Value::as_str) != Some("CustomResourceDefinition") {
        return None;
    }

    let spec: CrdSpec = match doc.get("spec").cloned().map(serde_json::from_value) {
        Some(Ok(spec)) => spec,
        Some(Err(e)) => {
            warn!(error = %e, "Skipping malformed CustomResourceDefinition");
            return None;
        }
        None => return None,
    };

    let version_label = doc
        .pointer("/metadata/labels")
        .and_then(|labels| labels.get(CRD_VERSION_LABEL))
        .and_then(Value::as_str)
        .map(str::to_string);

    let components = spec
        .versions
        .iter()
        .filter(|v| v.served)
        .map(|v| {
            let schema = v
                .schema
                .as_ref()
                .and_then(|s| s.get("openAPIV3Schema"))
                .map(Value::to_string)
                .unwrap_or_default();
            ComponentSpec {
                kind: spec.names.kind.clone(),
                version: format!("{}/{}", spec.group, v.name),
                schema,
            }
        })
        .collect();

    Some((components, version_label))
}

/// Parse a multi-document YAML or JSON manifest stream
pub(crate) fn parse_manifests(text: &str) -> ServiceResult<GeneratedPackage> {
    let mut components = Vec::new();
    let mut version = None;

    for document in serde_yaml::Deserializer::from_str(text) {
        let doc = match Value::deserialize(document) {
            Ok(Value::Null) => continue,
            Ok(doc) => doc,
            Err(e) => {
                debug!(error = %e, "Skipping undecodable manifest document");
                continue;
            }
        };

        if let Some((mut found, label)) = components_from_document(&doc) {
            components.append(&mut found);
            if version.is_none() {
                version = label;
            }
        }
    }

    if components.is_empty() {
        return Err(ServiceError::Generation(
            "no component definitions found at source".to_string(),
        ));
    }

    Ok(GeneratedPackage {
        version: version.unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string()),
        components,
    })
}

/// Downloads Kubernetes CRD manifests over HTTP
#[derive(Debug, Clone)]
pub struct HttpPackageGenerator {
    client: reqwest::Client,
}

impl HttpPackageGenerator {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PackageGenerator for HttpPackageGenerator {
    #[instrument(skip(self), fields(registrant = %registrant))]
    async fn generate(
        &self,
        registrant: &str,
        url: &str,
        model_name: &str,
    ) -> ServiceResult<GeneratedPackage> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Download(format!(
                "failed to fetch {}: status code {}",
                url,
                status.as_u16()
            )));
        }

        let text = response.text().await?;
        let package = parse_manifests(&text)?;
        debug!(
            model = model_name,
            components = package.components.len(),
            version = %package.version,
            "Resolved source manifests"
        );
        Ok(package)
    }
}

/// Adapter for URL imports
pub struct UrlImportAdapter {
    generator: Arc<dyn PackageGenerator>,
    config: Arc<PipelineConfig>,
}

impl UrlImportAdapter {
    pub fn new(generator: Arc<dyn PackageGenerator>, config: Arc<PipelineConfig>) -> Self {
        Self { generator, config }
    }

    #[instrument(skip(self, body), fields(url = %body.url))]
    pub async fn stage(&self, body: &UrlImport) -> ServiceResult<StagedImport> {
        let mut metadata = body.model.clone();
        metadata.apply_defaults();
        if metadata.model.is_empty() {
            return Err(ServiceError::InvalidInput("model name is required".to_string()));
        }

        let generated = self
            .generator
            .generate(&metadata.registrant, &body.url, &metadata.model)
            .await?;

        let scratch = self.config.scratch_dir("url-import-")?;
        let root = scratch.path().to_path_buf();

        let package_root = tokio::task::spawn_blocking(move || {
            let model = metadata.to_model_definition(&generated.version);
            let paths = PackagePaths::new(
                versioned_dir(&root, &model.name, &generated.version, DEFAULT_DEFINITION_VERSION),
                OutputFormat::Json,
            );
            paths.create_dirs()?;
            paths.write_entity(&Entity::Model(model.clone()), OutputFormat::Json)?;

            let header = model.stripped();
            let styles = metadata.component_styles();
            for spec in generated.components {
                let mut component = ComponentDefinition::new(spec.kind.clone(), spec.schema.clone())
                    .with_model(header.clone());
                component.component = spec;
                component.styles = Some(styles.clone());
                paths.write_entity(&Entity::Component(component), OutputFormat::Json)?;
            }

            // Specs sharing kind and version land on one file
            let written = entity_files(&paths.components_dir)?.len();
            Ok::<_, ServiceError>((paths.root, model.name, written))
        })
        .await??;

        let (package_root, model_name, component_count) = package_root;
        info!(model = %model_name, components = component_count, "Generated model from URL");

        Ok(StagedImport::new(
            vec![Dir::new(package_root)],
            format!(
                "Imported {} components for model {}",
                component_count, model_name
            ),
            scratch,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRDS: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: issuers.cert-manager.io
  labels:
    app.kubernetes.io/version: v1.13.0
spec:
  group: cert-manager.io
  names:
    kind: Issuer
  versions:
    - name: v1
      served: true
      schema:
        openAPIV3Schema:
          type: object
    - name: v1alpha1
      served: false
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: ignored
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: certificates.cert-manager.io
spec:
  group: cert-manager.io
  names:
    kind: Certificate
  versions:
    - name: v1
"#;

    #[test]
    fn test_apply_defaults() {
        let mut metadata = UrlModelMetadata {
            model: "Cert-Manager".to_string(),
            ..Default::default()
        };
        metadata.apply_defaults();

        assert_eq!(metadata.model, "cert-manager");
        assert_eq!(metadata.model_display_name, "cert-manager");
        assert_eq!(metadata.primary_color, "#00B39F");
        assert_eq!(metadata.secondary_color, "#00D3A9");
        assert_eq!(metadata.shape, "circle");
        assert_eq!(metadata.category, "Uncategorized");
        assert_eq!(metadata.sub_category, "Uncategorized");
        assert_eq!(metadata.registrant, "github");
        assert!(metadata.svg_color.is_empty());
    }

    #[test]
    fn test_parse_manifests() {
        let package = parse_manifests(CRDS).unwrap();
        assert_eq!(package.version, "v1.13.0");
        assert_eq!(package.components.len(), 2);
        assert_eq!(package.components[0].kind, "Issuer");
        assert_eq!(package.components[0].version, "cert-manager.io/v1");
        assert_eq!(package.components[0].schema, r#"{"type":"object"}"#);
        assert!(package.components[1].schema.is_empty());
    }

    #[test]
    fn test_parse_manifests_without_crds() {
        let err = parse_manifests("kind: ConfigMap\n").unwrap_err();
        assert!(matches!(err, ServiceError::Generation(_)));
    }

    struct FixedGenerator(GeneratedPackage);

    #[async_trait]
    impl PackageGenerator for FixedGenerator {
        async fn generate(&self, _: &str, _: &str, _: &str) -> ServiceResult<GeneratedPackage> {
            Ok(self.0.clone())
        }
    }

    fn spec(kind: &str, version: &str) -> ComponentSpec {
        ComponentSpec {
            kind: kind.to_string(),
            version: version.to_string(),
            schema: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stage_keeps_same_kind_components_apart() {
        let root = tempfile::TempDir::new().unwrap();
        let generated = GeneratedPackage {
            version: "v1.13.0".to_string(),
            components: vec![
                spec("Issuer", "cert-manager.io/v1"),
                spec("Issuer", "cert-manager.io/v1beta1"),
                spec("Issuer", "cert-manager.io/v1"),
            ],
        };
        let adapter = UrlImportAdapter::new(
            Arc::new(FixedGenerator(generated)),
            Arc::new(PipelineConfig::rooted_at(root.path())),
        );
        let body = UrlImport {
            url: "https://example.com/crds.yaml".to_string(),
            model: UrlModelMetadata {
                model: "cert-manager".to_string(),
                ..Default::default()
            },
        };

        let staged = adapter.stage(&body).await.unwrap();
        let package = staged.dirs[0].path();
        let components = entity_files(&package.join(model_registry_core::COMPONENTS_DIR)).unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(
            staged.description,
            "Imported 2 components for model cert-manager"
        );
    }

    #[test]
    fn test_version_defaults_without_label() {
        let text = CRDS.replace("    app.kubernetes.io/version: v1.13.0\n", "    other: x\n");
        assert_eq!(parse_manifests(&text).unwrap().version, DEFAULT_MODEL_VERSION);
    }
}
