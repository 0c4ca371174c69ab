//! Spreadsheet (CSV triple) adapter

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use model_registry_core::layout::{discover_packages, versioned_dir};
use model_registry_core::{
    Category, ComponentDefinition, ComponentStyles, Entity, ModelDefinition,
    ModelMetadata, OutputFormat, PackagePaths, RelationshipDefinition, DEFAULT_DEFINITION_VERSION,
    UNCATEGORIZED,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use super::{decode_base64, CsvImport, StagedImport, DEFAULT_MODEL_VERSION};
use crate::config::PipelineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::registration::Dir;

/// Prefix every spreadsheet data URL must carry
pub const CSV_DATA_URL_PREFIX: &str = "data:text/csv;base64,";

/// Validate and decode one spreadsheet data URL
pub fn decode_csv_data_url(data_url: &str, sheet: &str) -> ServiceResult<Vec<u8>> {
    let payload = data_url.strip_prefix(CSV_DATA_URL_PREFIX).ok_or_else(|| {
        ServiceError::InvalidFileType(format!("{} sheet is not of type csv", sheet))
    })?;
    decode_base64(payload, sheet)
}

/// Locations of the three sheets handed to a generator
#[derive(Debug, Clone)]
pub struct SheetPaths {
    pub model: PathBuf,
    pub component: PathBuf,
    pub relationship: PathBuf,
}

/// Turns the three sheets into model packages
pub trait SheetGenerator: Send + Sync {
    /// Write zero or more packages under `output_dir`, returning how many
    fn generate(&self, sheets: &SheetPaths, output_dir: &Path) -> ServiceResult<usize>;
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn non_empty_or(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ModelRow {
    model: String,
    model_display_name: String,
    category: String,
    sub_category: String,
    registrant: String,
    primary_color: String,
    secondary_color: String,
    shape: String,
    svg_color: String,
    svg_white: String,
    svg_complete: String,
    is_annotation: String,
    publish_to_registry: String,
    version: String,
    description: String,
}

impl ModelRow {
    fn to_model_definition(&self) -> ModelDefinition {
        let mut model = ModelDefinition::new(self.model.trim())
            .with_model_version(non_empty_or(&self.version, DEFAULT_MODEL_VERSION))
            .with_registrant(self.registrant.trim());
        model.display_name = non_empty_or(&self.model_display_name, &model.name);
        model.description = self.description.trim().to_string();
        model.category = Category {
            name: non_empty_or(&self.category, UNCATEGORIZED),
        };
        model.sub_category = non_empty_or(&self.sub_category, UNCATEGORIZED);
        model.metadata = ModelMetadata {
            primary_color: self.primary_color.trim().to_string(),
            secondary_color: self.secondary_color.trim().to_string(),
            shape: self.shape.trim().to_string(),
            svg_color: self.svg_color.trim().to_string(),
            svg_white: self.svg_white.trim().to_string(),
            svg_complete: self.svg_complete.trim().to_string(),
            is_annotation: parse_flag(&self.is_annotation),
            publish_to_registry: parse_flag(&self.publish_to_registry),
        };
        model
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ComponentRow {
    model: String,
    component: String,
    version: String,
    description: String,
    schema: String,
    svg_color: String,
    svg_white: String,
    svg_complete: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RelationshipRow {
    model: String,
    kind: String,
    #[serde(rename = "type")]
    relationship_type: String,
    sub_type: String,
    selectors: String,
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> ServiceResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Default generator reading the sheets with the `csv` crate
///
/// Missing optional columns are tolerated. Component and relationship rows
/// naming a model absent from the model sheet are skipped.
#[derive(Debug, Clone, Default)]
pub struct CsvSheetGenerator;

impl CsvSheetGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SheetGenerator for CsvSheetGenerator {
    fn generate(&self, sheets: &SheetPaths, output_dir: &Path) -> ServiceResult<usize> {
        let model_rows: Vec<ModelRow> = read_rows(&sheets.model)?;
        let component_rows: Vec<ComponentRow> = read_rows(&sheets.component)?;
        let relationship_rows: Vec<RelationshipRow> = read_rows(&sheets.relationship)?;

        let mut packages: HashMap<String, (ModelDefinition, PackagePaths)> = HashMap::new();
        for row in model_rows.iter().filter(|r| !r.model.trim().is_empty()) {
            let model = row.to_model_definition();
            let paths = PackagePaths::new(
                versioned_dir(
                    output_dir,
                    &model.name,
                    &model.model.version,
                    DEFAULT_DEFINITION_VERSION,
                ),
                OutputFormat::Json,
            );
            paths.create_dirs()?;
            paths.write_entity(&Entity::Model(model.clone()), OutputFormat::Json)?;
            packages.insert(model.name.clone(), (model, paths));
        }

        for row in component_rows.iter().filter(|r| !r.component.trim().is_empty()) {
            let Some((model, paths)) = packages.get(&row.model.trim().to_lowercase()) else {
                warn!(model = %row.model, component = %row.component, "Skipping component of unknown model");
                continue;
            };

            let mut component = ComponentDefinition::new(row.component.trim(), row.schema.trim())
                .with_api_version(row.version.trim())
                .with_model(model.stripped());
            component.description = row.description.trim().to_string();
            component.styles = Some(ComponentStyles {
                primary_color: model.metadata.primary_color.clone(),
                secondary_color: model.metadata.secondary_color.clone(),
                shape: model.metadata.shape.clone(),
                svg_color: row.svg_color.trim().to_string(),
                svg_white: row.svg_white.trim().to_string(),
                svg_complete: row.svg_complete.trim().to_string(),
            });
            paths.write_entity(&Entity::Component(component), OutputFormat::Json)?;
        }

        for row in relationship_rows.iter().filter(|r| !r.kind.trim().is_empty()) {
            let Some((model, paths)) = packages.get(&row.model.trim().to_lowercase()) else {
                warn!(model = %row.model, kind = %row.kind, "Skipping relationship of unknown model");
                continue;
            };

            let selectors = match row.selectors.trim() {
                "" => serde_json::Value::Null,
                raw => match serde_json::from_str(raw) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(model = %row.model, kind = %row.kind, error = %e, "Skipping relationship with invalid selectors");
                        continue;
                    }
                },
            };

            let relationship = RelationshipDefinition::new(
                row.kind.trim(),
                row.relationship_type.trim(),
                row.sub_type.trim(),
            )
            .with_selectors(selectors)
            .with_model(model.stripped());
            paths.write_entity(&Entity::Relationship(relationship), OutputFormat::Json)?;
        }

        Ok(packages.len())
    }
}

/// Copy every file below `from` into `to`, merging with existing content
fn copy_tree(from: &Path, to: &Path) -> ServiceResult<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| ServiceError::Io(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| ServiceError::Io(e.to_string()))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Adapter for spreadsheet imports
pub struct CsvImportAdapter {
    generator: Arc<dyn SheetGenerator>,
    config: Arc<PipelineConfig>,
}

impl CsvImportAdapter {
    pub fn new(generator: Arc<dyn SheetGenerator>, config: Arc<PipelineConfig>) -> Self {
        Self { generator, config }
    }

    /// Decode the sheets, generate packages and copy them into the cache
    ///
    /// All three data URLs are validated before anything is written.
    #[instrument(skip(self, body))]
    pub async fn stage(&self, body: &CsvImport) -> ServiceResult<StagedImport> {
        let model_csv = decode_csv_data_url(&body.model_csv, "Model")?;
        let component_csv = decode_csv_data_url(&body.component_csv, "Component")?;
        let relationship_csv = decode_csv_data_url(&body.relationship_csv, "Relationship")?;

        let scratch = self.config.scratch_dir("csv-import-")?;
        let root = scratch.path().to_path_buf();
        let cache_dir = self.config.cache_dir.clone();
        let generator = self.generator.clone();

        let (generated, packages) = tokio::task::spawn_blocking(move || {
            let sheets = SheetPaths {
                model: root.join("model.csv"),
                component: root.join("component.csv"),
                relationship: root.join("relationship.csv"),
            };
            fs::write(&sheets.model, model_csv)?;
            fs::write(&sheets.component, component_csv)?;
            fs::write(&sheets.relationship, relationship_csv)?;

            let output = root.join("output");
            fs::create_dir_all(&output)?;
            let generated = generator.generate(&sheets, &output)?;

            let packages = discover_packages(&output)?;
            copy_tree(&output, &cache_dir)?;

            Ok::<_, ServiceError>((generated, packages))
        })
        .await??;

        info!(models = generated, "Generated models from spreadsheet");

        let dirs = packages.into_iter().map(Dir::new).collect();
        Ok(StagedImport::new(
            dirs,
            format!("Generated {} model(s) from spreadsheet", generated),
            scratch,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use model_registry_core::layout::entity_files;
    use model_registry_core::Connection;
    use tempfile::TempDir;

    fn data_url(csv: &str) -> String {
        format!("{}{}", CSV_DATA_URL_PREFIX, STANDARD.encode(csv))
    }

    const MODELS: &str = "model,modelDisplayName,category,registrant,version\nCert-Manager,Cert Manager,Security,github,v1.13.0\n";
    const COMPONENTS: &str = "model,component,version,schema\ncert-manager,Issuer,cert-manager.io/v1,{}\ncert-manager,Certificate,cert-manager.io/v1,{}\nunknown,Orphan,v1,{}\n";
    const RELATIONSHIPS: &str = "model,kind,type,subType,selectors\ncert-manager,edge,binding,reference,\"[{\"\"allow\"\":{}}]\"\n";

    #[test]
    fn test_decode_requires_prefix() {
        let err = decode_csv_data_url("data:text/plain;base64,YQ==", "Model").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidFileType(_)));
        assert_eq!(decode_csv_data_url(&data_url("a,b"), "Model").unwrap(), b"a,b");
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_csv_data_url("data:text/csv;base64,!!!", "Model").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn test_generator_writes_packages() {
        let tmp = TempDir::new().unwrap();
        let sheets = SheetPaths {
            model: tmp.path().join("m.csv"),
            component: tmp.path().join("c.csv"),
            relationship: tmp.path().join("r.csv"),
        };
        fs::write(&sheets.model, MODELS).unwrap();
        fs::write(&sheets.component, COMPONENTS).unwrap();
        fs::write(&sheets.relationship, RELATIONSHIPS).unwrap();

        let output = tmp.path().join("out");
        let count = CsvSheetGenerator::new().generate(&sheets, &output).unwrap();
        assert_eq!(count, 1);

        let packages = discover_packages(&output).unwrap();
        assert_eq!(packages.len(), 1);
        assert!(packages[0].ends_with("cert-manager/v1.13.0/v1.0.0"));

        let paths = PackagePaths::new(&packages[0], OutputFormat::Json);
        assert_eq!(entity_files(&paths.components_dir).unwrap().len(), 2);
        assert_eq!(entity_files(&paths.relationships_dir).unwrap().len(), 1);

        let Entity::Model(model) = Entity::decode_file(&paths.model_file).unwrap() else {
            panic!("expected a model document");
        };
        assert_eq!(model.display_name, "Cert Manager");
        assert_eq!(model.registrant, Connection::new("github"));
    }

    #[tokio::test]
    async fn test_stage_copies_into_cache() {
        let root = TempDir::new().unwrap();
        let config = Arc::new(PipelineConfig::rooted_at(root.path()));
        let adapter = CsvImportAdapter::new(Arc::new(CsvSheetGenerator::new()), config.clone());

        let body = CsvImport {
            model_csv: data_url(MODELS),
            component_csv: data_url(COMPONENTS),
            relationship_csv: data_url(RELATIONSHIPS),
        };
        let staged = adapter.stage(&body).await.unwrap();
        assert_eq!(staged.dirs.len(), 1);
        assert!(config.cache_dir.join("cert-manager").is_dir());

        drop(staged);
        assert_eq!(fs::read_dir(&config.temp_root).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_tree_merges_nested_dirs() {
        let from = TempDir::new().unwrap();
        let to = TempDir::new().unwrap();
        let nested = from.path().join("argo").join("v1").join("components");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Workflow.json"), "{}").unwrap();
        fs::write(from.path().join("argo").join("notes.txt"), "new").unwrap();

        fs::create_dir_all(to.path().join("argo")).unwrap();
        fs::write(to.path().join("argo").join("notes.txt"), "old").unwrap();
        fs::write(to.path().join("argo").join("kept.txt"), "kept").unwrap();

        copy_tree(from.path(), to.path()).unwrap();

        let copied = to.path().join("argo").join("v1").join("components");
        assert_eq!(fs::read_to_string(copied.join("Workflow.json")).unwrap(), "{}");
        assert_eq!(
            fs::read_to_string(to.path().join("argo").join("notes.txt")).unwrap(),
            "new"
        );
        assert!(to.path().join("argo").join("kept.txt").is_file());
    }

    #[tokio::test]
    async fn test_prefix_error_creates_no_scratch() {
        let root = TempDir::new().unwrap();
        let config = Arc::new(PipelineConfig::rooted_at(root.path()));
        let adapter = CsvImportAdapter::new(Arc::new(CsvSheetGenerator::new()), config.clone());

        let body = CsvImport {
            model_csv: data_url(MODELS),
            component_csv: data_url(COMPONENTS),
            relationship_csv: "data:text/plain;base64,YQ==".to_string(),
        };
        let err = adapter.stage(&body).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidFileType(_)));
        assert!(!config.temp_root.exists());
    }
}
