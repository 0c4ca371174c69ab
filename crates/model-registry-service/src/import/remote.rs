//! Remote archive adapter

use std::fs;
use std::sync::Arc;

use tracing::{info, instrument};

use super::{RemoteImport, StagedImport};
use crate::archive::detect_file_type;
use crate::config::PipelineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::registration::Dir;

/// Adapter downloading an archive, OCI image or single document
pub struct RemoteArchiveAdapter {
    client: reqwest::Client,
    config: Arc<PipelineConfig>,
}

impl RemoteArchiveAdapter {
    pub fn new(client: reqwest::Client, config: Arc<PipelineConfig>) -> Self {
        Self { client, config }
    }

    /// Download the body and stage it as `model.<ext>`
    ///
    /// Nothing is written unless the download fully succeeded.
    #[instrument(skip(self, body), fields(url = %body.url))]
    pub async fn stage(&self, body: &RemoteImport) -> ServiceResult<StagedImport> {
        let response = self.client.get(&body.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Download(format!(
                "failed to download file. status code: {}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Download(format!("failed to read response body: {}", e)))?;

        let kind = detect_file_type(&bytes);
        let scratch = self.config.scratch_dir("remote-import-")?;
        let path = scratch.path().join(format!("model{}", kind.extension()));
        let written = path.clone();
        let size = bytes.len();
        tokio::task::spawn_blocking(move || fs::write(written, bytes)).await??;

        info!(kind = ?kind, bytes = size, "Downloaded remote model");

        Ok(StagedImport::new(
            vec![Dir::new(path)],
            format!("Downloaded {}", body.url),
            scratch,
        ))
    }
}
