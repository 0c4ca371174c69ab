//! SVG asset handling
//!
//! Model metadata and component styles reference their icons either as inline
//! markup or as a path relative to the asset root. Export inlines the
//! referenced files; component registration writes inline markup out to the
//! asset root and keeps only the relative path.

use std::fs;
use std::path::{Component as PathComponent, Path, PathBuf};

use model_registry_core::layout::sanitize_segment;
use model_registry_core::{ComponentDefinition, ModelDefinition};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Variants of an icon, in field order
const VARIANTS: [&str; 3] = ["color", "white", "complete"];

/// Reads and writes SVG assets
pub trait SvgStore: Send + Sync {
    /// Replace SVG path references in the model metadata with file content
    fn inline_model(&self, model: &mut ModelDefinition) -> ServiceResult<()>;

    /// Replace SVG path references in the component styles with file content
    fn inline_component(&self, component: &mut ComponentDefinition) -> ServiceResult<()>;

    /// Persist inline SVG markup of a component, replacing it with paths
    fn write_component(&self, component: &mut ComponentDefinition) -> ServiceResult<()>;
}

/// Whether a field holds markup rather than a path
pub fn is_svg_markup(value: &str) -> bool {
    let value = value.trim_start();
    value.starts_with("<svg") || value.starts_with("<?xml")
}

/// Filesystem-backed store rooted at the asset directory
#[derive(Debug, Clone)]
pub struct FsSvgStore {
    root: PathBuf,
}

impl FsSvgStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> ServiceResult<PathBuf> {
        let relative = Path::new(reference.trim());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, PathComponent::Normal(_) | PathComponent::CurDir));
        if escapes {
            return Err(ServiceError::InvalidInput(format!(
                "SVG reference escapes the asset root: {}",
                reference
            )));
        }
        Ok(self.root.join(relative))
    }

    fn inline(&self, field: &mut String) -> ServiceResult<()> {
        if field.trim().is_empty() || is_svg_markup(field) {
            return Ok(());
        }
        let path = self.resolve(field)?;
        *field = fs::read_to_string(&path)?;
        debug!(path = %path.display(), "Inlined SVG");
        Ok(())
    }

    fn inline_all(&self, fields: [&mut String; 3]) -> ServiceResult<()> {
        for field in fields {
            self.inline(field)?;
        }
        Ok(())
    }
}

impl SvgStore for FsSvgStore {
    fn inline_model(&self, model: &mut ModelDefinition) -> ServiceResult<()> {
        let metadata = &mut model.metadata;
        self.inline_all([
            &mut metadata.svg_color,
            &mut metadata.svg_white,
            &mut metadata.svg_complete,
        ])
    }

    fn inline_component(&self, component: &mut ComponentDefinition) -> ServiceResult<()> {
        let Some(styles) = component.styles.as_mut() else {
            return Ok(());
        };
        self.inline_all([
            &mut styles.svg_color,
            &mut styles.svg_white,
            &mut styles.svg_complete,
        ])
    }

    fn write_component(&self, component: &mut ComponentDefinition) -> ServiceResult<()> {
        let model_dir = sanitize_segment(&component.model.name.to_lowercase());
        let kind = sanitize_segment(&component.component.kind.to_lowercase());
        let Some(styles) = component.styles.as_mut() else {
            return Ok(());
        };

        let fields = [
            &mut styles.svg_color,
            &mut styles.svg_white,
            &mut styles.svg_complete,
        ];
        for (variant, field) in VARIANTS.iter().zip(fields) {
            if !is_svg_markup(field) {
                continue;
            }

            let relative = format!("{}/{}/{}-{}.svg", model_dir, variant, kind, variant);
            let path = self.root.join(&relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, field.as_bytes())?;
            debug!(path = %path.display(), "Wrote SVG");
            *field = relative;
        }
        Ok(())
    }
}
