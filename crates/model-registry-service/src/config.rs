//! Pipeline configuration
//!
//! Directory locations are resolved once when the configuration is built and
//! injected into the services; nothing inside the pipeline reads the
//! environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::error::ServiceResult;

/// Configuration of the import, registration and export pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Persistent registry-local copy of generated spreadsheet packages
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Parent of every scratch directory
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,

    /// Root SVG references are resolved against
    #[serde(default = "default_svg_asset_root")]
    pub svg_asset_root: PathBuf,

    /// Maximum number of packages registered at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for remote downloads in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

fn default_cache_dir() -> PathBuf {
    home_dir().join(".model-registry").join("models")
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_svg_asset_root() -> PathBuf {
    home_dir().join(".model-registry").join("assets")
}

fn default_max_concurrency() -> usize {
    8
}

fn default_download_timeout_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            temp_root: default_temp_root(),
            svg_asset_root: default_svg_asset_root(),
            max_concurrency: default_max_concurrency(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    /// Configuration with every directory placed under `root`
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            cache_dir: root.join("cache"),
            temp_root: root.join("tmp"),
            svg_asset_root: root.join("assets"),
            ..Default::default()
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = dir.into();
        self
    }

    pub fn with_svg_asset_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.svg_asset_root = dir.into();
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Create a uniquely named scratch directory under the temp root
    ///
    /// The directory and everything in it is removed when the returned
    /// handle is dropped.
    pub fn scratch_dir(&self, prefix: &str) -> ServiceResult<TempDir> {
        fs::create_dir_all(&self.temp_root)?;
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.temp_root)?)
    }
}
