//! Uploaded file adapter

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use super::{decode_base64, FileImport, StagedImport};
use crate::config::PipelineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::registration::Dir;

/// Reduce a client-supplied file name to a safe final path component
pub fn sanitize_upload_name(name: &str) -> ServiceResult<String> {
    let invalid = || ServiceError::InvalidInput(format!("Invalid file name: {:?}", name));

    let file_name = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;

    match file_name {
        "" | "." | ".." => Err(invalid()),
        n => Ok(n.to_string()),
    }
}

/// Strip an optional `data:<mime>;base64,` prefix
fn strip_data_url(body: &str) -> &str {
    match body.trim_start().strip_prefix("data:") {
        Some(rest) => rest.split_once(";base64,").map_or(body, |(_, data)| data),
        None => body,
    }
}

/// Adapter for uploaded files
pub struct FileImportAdapter {
    config: Arc<PipelineConfig>,
}

impl FileImportAdapter {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    #[instrument(skip(self, body), fields(file_name = %body.file_name))]
    pub async fn stage(&self, body: &FileImport) -> ServiceResult<StagedImport> {
        let file_name = sanitize_upload_name(&body.file_name)?;
        let content = decode_base64(strip_data_url(&body.model_file), "model file")?;

        let scratch = self.config.scratch_dir("file-import-")?;
        let path = scratch.path().join(&file_name);
        let size = content.len();
        let written = path.clone();
        tokio::task::spawn_blocking(move || fs::write(written, content)).await??;

        info!(file = %file_name, bytes = size, "Staged uploaded file");

        Ok(StagedImport::new(
            vec![Dir::new(path)],
            format!("Staged file {}", file_name),
            scratch,
        ))
    }
}
