//! Canonical package layout
//!
//! Every ingestion path and the exporter agree on one directory contract:
//!
//! ```text
//! {modelName}/{modelVersion}/{schemaVersion}/
//!     model.<fmt>
//!     components/<name>.<fmt>
//!     relationships/<name>.<fmt>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entity::{Entity, OutputFormat};
use crate::error::{RegistryError, Result};

/// Directory holding component documents inside a package
pub const COMPONENTS_DIR: &str = "components";

/// Directory holding relationship documents inside a package
pub const RELATIONSHIPS_DIR: &str = "relationships";

/// Stem of the model document inside a package
pub const MODEL_FILE_STEM: &str = "model";

const MODEL_FILE_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Replace characters that are unsafe in a single path segment
pub fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "unnamed".to_string(),
        s => s.to_string(),
    }
}

/// Compute `{root}/{name}/{model_version}/{schema_version}` with the name
/// lower-cased
pub fn versioned_dir(root: &Path, name: &str, model_version: &str, schema_version: &str) -> PathBuf {
    root.join(sanitize_segment(&name.to_lowercase()))
        .join(sanitize_segment(model_version))
        .join(sanitize_segment(schema_version))
}

/// File name an entity is written under inside its package
pub fn entity_file_name(entity: &Entity, format: OutputFormat) -> String {
    let stem = match entity {
        Entity::Model(_) => MODEL_FILE_STEM.to_string(),
        // Kinds repeat across API versions of the same model
        Entity::Component(c) if c.component.version.trim().is_empty() => {
            sanitize_segment(&c.component.kind)
        }
        Entity::Component(c) => sanitize_segment(&format!(
            "{}-{}",
            c.component.kind, c.component.version
        )),
        Entity::Relationship(r) => sanitize_segment(&format!(
            "{}-{}-{}",
            r.kind.to_lowercase(),
            r.sub_type.to_lowercase(),
            r.id
        )),
    };
    format!("{}.{}", stem, format.extension())
}

/// Paths making up one package directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePaths {
    pub root: PathBuf,
    pub model_file: PathBuf,
    pub components_dir: PathBuf,
    pub relationships_dir: PathBuf,
}

impl PackagePaths {
    /// Describe the package rooted at `root`
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        let root = root.into();
        Self {
            model_file: root.join(format!("{}.{}", MODEL_FILE_STEM, format.extension())),
            components_dir: root.join(COMPONENTS_DIR),
            relationships_dir: root.join(RELATIONSHIPS_DIR),
            root,
        }
    }

    /// Create the package root and both child directories
    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.components_dir)?;
        fs::create_dir_all(&self.relationships_dir)?;
        Ok(())
    }

    /// Path an entity is written to inside this package
    pub fn entity_path(&self, entity: &Entity, format: OutputFormat) -> PathBuf {
        let file_name = entity_file_name(entity, format);
        match entity {
            Entity::Model(_) => self.root.join(file_name),
            Entity::Component(_) => self.components_dir.join(file_name),
            Entity::Relationship(_) => self.relationships_dir.join(file_name),
        }
    }

    /// Encode and write an entity to its place in this package
    pub fn write_entity(&self, entity: &Entity, format: OutputFormat) -> Result<PathBuf> {
        let path = self.entity_path(entity, format);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, entity.encode(format)?)?;
        Ok(path)
    }
}

/// Locate the model document directly inside `dir`
pub fn find_model_file(dir: &Path) -> Option<PathBuf> {
    MODEL_FILE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", MODEL_FILE_STEM, ext)))
        .find(|p| p.is_file())
}

/// Check that `path` is a package root and return its model document
///
/// Only `components/` and `relationships/` may appear as subdirectories.
pub fn validate_package_root(path: &Path) -> Result<PathBuf> {
    let invalid = |reason: String| RegistryError::InvalidLayout {
        path: path.display().to_string(),
        reason,
    };

    if !path.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    let model_file =
        find_model_file(path).ok_or_else(|| invalid("missing model document".to_string()))?;

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name != COMPONENTS_DIR && name != RELATIONSHIPS_DIR {
                return Err(invalid(format!("unexpected directory '{}'", name)));
            }
        }
    }

    Ok(model_file)
}

/// Find every package root below `root`, sorted by path
pub fn discover_packages(root: &Path) -> Result<Vec<PathBuf>> {
    let mut packages = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| RegistryError::IoError(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let in_child_dir = entry
            .file_name()
            .to_str()
            .map_or(false, |n| n == COMPONENTS_DIR || n == RELATIONSHIPS_DIR);
        if in_child_dir {
            continue;
        }

        if find_model_file(entry.path()).is_some() {
            packages.push(entry.path().to_path_buf());
        }
    }

    packages.sort();
    Ok(packages)
}

/// Entity documents in one child directory of a package, sorted by path
pub fn entity_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && OutputFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
