//! Registration pipeline
//!
//! Walks staged package locations, registers every entity found against the
//! registry and aggregates the outcomes into a [`RegistrationReport`].
//!
//! One worker task runs per [`Dir`], bounded by `max_concurrency`. Workers
//! never touch the report directly: they send [`Outcome`]s over an `mpsc`
//! channel to a single collector task that owns it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use model_registry_core::layout::{
    discover_packages, entity_files, find_model_file, validate_package_root,
};
use model_registry_core::{
    Connection, Entity, EntityType, ModelDefinition, PackagePaths, OutputFormat, RegistryError,
};
use model_registry_store::{EntityRegistrationError, RegistryManager, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::archive::{extract_oci_layers, is_oci_layout, unpack_file, ArchiveKind};
use crate::config::PipelineConfig;
use crate::error::ServiceResult;

/// A staged filesystem location: a package tree or a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_file(&self) -> bool {
        self.path.is_file()
    }
}

/// Class of a registration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The registrant could not be registered
    RegistrantConflict,
    /// The owning model could not be registered
    ModelConflict,
    /// The document could not be decoded
    Unmarshal,
    /// The registry rejected the entity
    Schema,
    /// The file type is not supported
    UnsupportedFormat,
    /// A package directory does not follow the package layout
    InvalidLayout,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegistrantConflict => "registrant conflict",
            Self::ModelConflict => "model conflict",
            Self::Unmarshal => "unmarshal",
            Self::Schema => "schema",
            Self::UnsupportedFormat => "unsupported format",
            Self::InvalidLayout => "invalid layout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity (or file) that failed to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFailure {
    /// `None` when the file could not be typed at all
    pub entity_type: Option<EntityType>,
    pub identity: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl RegistrationFailure {
    fn unreadable(path: &Path, err: &RegistryError) -> Self {
        let kind = match err {
            RegistryError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            RegistryError::InvalidLayout { .. } => FailureKind::InvalidLayout,
            _ => FailureKind::Unmarshal,
        };
        Self {
            entity_type: None,
            identity: path_identity(path),
            kind,
            detail: err.to_string(),
        }
    }

    fn rejected(entity: &Entity, err: &EntityRegistrationError) -> Self {
        let kind = if err.registrant_error {
            FailureKind::RegistrantConflict
        } else if err.model_error {
            FailureKind::ModelConflict
        } else {
            match err.source {
                StoreError::SchemaValidation(_) => FailureKind::Schema,
                StoreError::Domain(_) => FailureKind::Unmarshal,
                _ => FailureKind::Unknown,
            }
        };
        Self {
            entity_type: Some(entity.entity_type()),
            identity: entity.identity(),
            kind,
            detail: err.to_string(),
        }
    }
}

impl fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity_type {
            Some(entity_type) => write!(f, "{} '{}'", entity_type, self.identity)?,
            None => write!(f, "'{}'", self.identity)?,
        }
        write!(f, " ({}): {}", self.kind, self.detail)
    }
}

fn path_identity(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Per-type counts of registered entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    pub models: usize,
    pub components: usize,
    pub relationships: usize,
}

/// Aggregated outcome of one registration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReport {
    /// Every attempted entity, failed or not
    pub total_count: usize,
    pub err_count: usize,
    pub entity_counts: EntityCounts,
    /// Models registered, in completion order
    pub model_names: Vec<String>,
    pub failures: Vec<RegistrationFailure>,
}

impl RegistrationReport {
    fn record(&mut self, outcome: Outcome) {
        self.total_count += 1;
        match outcome {
            Outcome::Registered(entity_type, model_name) => match entity_type {
                EntityType::Model => {
                    self.entity_counts.models += 1;
                    if !self.model_names.contains(&model_name) {
                        self.model_names.push(model_name);
                    }
                }
                EntityType::Component => self.entity_counts.components += 1,
                EntityType::Relationship => self.entity_counts.relationships += 1,
            },
            Outcome::Failed(failure) => {
                self.err_count += 1;
                self.failures.push(failure);
            }
        }
    }

    /// Number of entities registered
    pub fn success_count(&self) -> usize {
        self.total_count - self.err_count
    }

    /// One-line account of what was registered
    pub fn summary_message(&self) -> String {
        if self.total_count == 0 {
            return "No entities found to register".to_string();
        }

        let counts = &self.entity_counts;
        let mut message = format!(
            "Registered {} model(s), {} component(s) and {} relationship(s)",
            counts.models, counts.components, counts.relationships
        );
        if !self.model_names.is_empty() {
            message.push_str(&format!(" for {}", self.model_names.join(", ")));
        }
        message
    }

    /// Account of every failure, `None` when everything registered
    pub fn error_message(&self) -> Option<String> {
        if self.err_count == 0 {
            return None;
        }

        let details: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        Some(format!(
            "Failed to register {} of {} entities: {}",
            self.err_count,
            self.total_count,
            details.join("; ")
        ))
    }
}

/// Result of one registration attempt
#[derive(Debug)]
enum Outcome {
    Registered(EntityType, String),
    Failed(RegistrationFailure),
}

type Loaded = Result<Entity, RegistrationFailure>;

/// Registers staged packages against the registry
#[derive(Clone)]
pub struct RegistrationHelper {
    registry: Arc<dyn RegistryManager>,
    config: Arc<PipelineConfig>,
}

impl RegistrationHelper {
    pub fn new(registry: Arc<dyn RegistryManager>, config: Arc<PipelineConfig>) -> Self {
        Self { registry, config }
    }

    /// Register every entity under `dirs`
    ///
    /// Individual failures are recorded in the report and never abort the run.
    #[instrument(skip(self, dirs), fields(dirs = dirs.len()))]
    pub async fn register(&self, dirs: Vec<Dir>) -> ServiceResult<RegistrationReport> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
        let collector = tokio::spawn(async move {
            let mut report = RegistrationReport::default();
            while let Some(outcome) = rx.recv().await {
                report.record(outcome);
            }
            report
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut workers = JoinSet::new();
        for dir in dirs {
            let helper = self.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                helper.register_dir(dir, tx).await;
            });
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Registration worker failed");
            }
        }

        let report = collector.await?;
        info!(
            total = report.total_count,
            errors = report.err_count,
            "Registration finished"
        );
        Ok(report)
    }

    async fn register_dir(&self, dir: Dir, tx: mpsc::UnboundedSender<Outcome>) {
        let path = dir.path().to_path_buf();
        let config = self.config.clone();
        let loaded = match tokio::task::spawn_blocking(move || load_dir(&path, &config)).await {
            Ok(loaded) => loaded,
            Err(e) => vec![Err(RegistrationFailure {
                entity_type: None,
                identity: path_identity(dir.path()),
                kind: FailureKind::Unknown,
                detail: e.to_string(),
            })],
        };

        debug!(path = %dir.path().display(), entities = loaded.len(), "Loaded entities");

        for item in loaded {
            let outcome = match item {
                Ok(entity) => self.register_one(entity).await,
                Err(failure) => Outcome::Failed(failure),
            };
            if tx.send(outcome).is_err() {
                warn!("Registration collector closed early");
                return;
            }
        }
    }

    async fn register_one(&self, entity: Entity) -> Outcome {
        let connection = connection_for(&entity);
        match self.registry.register_entity(&connection, &entity).await {
            Ok(()) => Outcome::Registered(entity.entity_type(), entity.model_name().to_string()),
            Err(e) => {
                debug!(entity = %entity.identity(), error = %e, "Entity registration failed");
                Outcome::Failed(RegistrationFailure::rejected(&entity, &e))
            }
        }
    }
}

/// Connection an entity is registered through: its model's registrant
fn connection_for(entity: &Entity) -> Connection {
    match entity {
        Entity::Model(m) => m.registrant.clone(),
        Entity::Component(c) => c.model.registrant.clone(),
        Entity::Relationship(r) => r.model.registrant.clone(),
    }
}

/// Load every entity staged at `path`
fn load_dir(path: &Path, config: &PipelineConfig) -> Vec<Loaded> {
    if path.is_dir() {
        return load_tree(path);
    }

    match ArchiveKind::from_path(path) {
        Some(ArchiveKind::Json) | Some(ArchiveKind::Yaml) => load_document(path),
        Some(ArchiveKind::Tar) | Some(ArchiveKind::TarGz) => load_archive(path, config),
        _ => vec![Err(RegistrationFailure::unreadable(
            path,
            &RegistryError::UnsupportedFormat(path_identity(path)),
        ))],
    }
}

/// Expand a model carrying inline children into separate entities
fn expand_model(mut model: ModelDefinition) -> Vec<Loaded> {
    model.normalize_name();
    let components = model.components.take().unwrap_or_default();
    let relationships = model.relationships.take().unwrap_or_default();

    let mut loaded = Vec::with_capacity(1 + components.len() + relationships.len());
    loaded.push(Ok(Entity::Model(model.clone())));
    for child in components
        .into_iter()
        .map(Entity::Component)
        .chain(relationships.into_iter().map(Entity::Relationship))
    {
        let mut child = child;
        child.adopt(&model);
        loaded.push(Ok(child));
    }
    loaded
}

fn load_document(path: &Path) -> Vec<Loaded> {
    match Entity::decode_file(path) {
        Ok(Entity::Model(model)) => expand_model(model),
        Ok(entity) => vec![Ok(entity)],
        Err(e) => vec![Err(RegistrationFailure::unreadable(path, &e))],
    }
}

fn load_package(root: &Path) -> Vec<Loaded> {
    if let Err(e) = validate_package_root(root) {
        warn!(package = %root.display(), error = %e, "Skipping malformed package");
        return vec![Err(RegistrationFailure::unreadable(root, &e))];
    }

    let paths = PackagePaths::new(root, OutputFormat::Json);
    let mut loaded = Vec::new();

    let model = match find_model_file(root).map(|p| (Entity::decode_file(&p), p)) {
        Some((Ok(Entity::Model(model)), _)) => {
            let mut expanded = expand_model(model);
            let header = match expanded.first() {
                Some(Ok(Entity::Model(m))) => Some(m.clone()),
                _ => None,
            };
            loaded.append(&mut expanded);
            header
        }
        Some((Ok(other), p)) => {
            loaded.push(Err(RegistrationFailure::unreadable(
                &p,
                &RegistryError::InvalidSchemaVersion(format!(
                    "expected a model document, found a {}",
                    other.entity_type()
                )),
            )));
            None
        }
        Some((Err(e), p)) => {
            loaded.push(Err(RegistrationFailure::unreadable(&p, &e)));
            None
        }
        None => None,
    };

    for dir in [&paths.components_dir, &paths.relationships_dir] {
        let files = match entity_files(dir) {
            Ok(files) => files,
            Err(e) => {
                loaded.push(Err(RegistrationFailure::unreadable(dir, &e)));
                continue;
            }
        };

        for file in files {
            match Entity::decode_file(&file) {
                Ok(mut entity) => {
                    if let Some(model) = &model {
                        entity.adopt(model);
                    }
                    loaded.push(Ok(entity));
                }
                Err(e) => loaded.push(Err(RegistrationFailure::unreadable(&file, &e))),
            }
        }
    }

    loaded
}

fn load_tree(root: &Path) -> Vec<Loaded> {
    let packages = match discover_packages(root) {
        Ok(packages) => packages,
        Err(e) => return vec![Err(RegistrationFailure::unreadable(root, &e))],
    };

    if packages.is_empty() {
        return vec![Err(RegistrationFailure::unreadable(
            root,
            &RegistryError::Unmarshal("no model definition found".to_string()),
        ))];
    }

    packages.iter().flat_map(|p| load_package(p)).collect()
}

fn load_archive(path: &Path, config: &PipelineConfig) -> Vec<Loaded> {
    let unpack = || -> ServiceResult<(tempfile::TempDir, PathBuf)> {
        let scratch = config.scratch_dir("registration-")?;
        let unpacked = scratch.path().join("archive");
        unpack_file(path, &unpacked)?;

        if is_oci_layout(&unpacked) {
            let layers = scratch.path().join("layers");
            let count = extract_oci_layers(&unpacked, &layers)?;
            debug!(layers = count, "Extracted OCI image layers");
            return Ok((scratch, layers));
        }
        Ok((scratch, unpacked))
    };

    match unpack() {
        // The scratch directory must outlive the tree walk
        Ok((_scratch, root)) => load_tree(&root),
        Err(e) => vec![Err(RegistrationFailure {
            entity_type: None,
            identity: path_identity(path),
            kind: FailureKind::Unmarshal,
            detail: e.to_string(),
        })],
    }
}
