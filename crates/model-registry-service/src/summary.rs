//! Cached registry summary
//!
//! Refreshed in the background after every import and component
//! registration. Readers see the last completed refresh.

use std::sync::Arc;

use model_registry_store::{RegistryManager, RegistrySummary};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Latest registry-wide totals
pub struct SummaryCache {
    registry: Arc<dyn RegistryManager>,
    latest: RwLock<Option<RegistrySummary>>,
}

impl SummaryCache {
    pub fn new(registry: Arc<dyn RegistryManager>) -> Self {
        Self {
            registry,
            latest: RwLock::new(None),
        }
    }

    /// Recompute the summary now
    pub async fn refresh(&self) {
        match self.registry.summary().await {
            Ok(summary) => {
                debug!(
                    models = summary.models,
                    components = summary.components,
                    "Refreshed registry summary"
                );
                *self.latest.write().await = Some(summary);
            }
            Err(e) => warn!(error = %e, "Failed to refresh registry summary"),
        }
    }

    /// Recompute the summary on a background task
    pub fn spawn_refresh(self: &Arc<Self>) {
        let cache = self.clone();
        tokio::spawn(async move { cache.refresh().await });
    }

    /// Last computed summary, `None` before the first refresh
    pub async fn latest(&self) -> Option<RegistrySummary> {
        self.latest.read().await.clone()
    }
}
