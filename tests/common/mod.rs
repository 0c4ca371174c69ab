//! Common test utilities and helpers
//!
//! Each test gets its own server on a random port, backed by a fresh
//! in-memory registry and a private pipeline root.

#![allow(dead_code)]

use model_registry_api::build_api_server;
use model_registry_core::Event;
use model_registry_service::{PipelineConfig, ServiceRegistryBuilder};
use model_registry_store::{
    BroadcastEventPublisher, EntityFilter, InMemoryRegistry, ModelFilter, RegistryManager,
};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub mod fixtures;

/// Test application state
pub struct TestApp {
    pub address: String,
    pub root: TempDir,
    pub registry: Arc<InMemoryRegistry>,
    pub publisher: Arc<BroadcastEventPublisher>,
}

impl TestApp {
    /// Start a server on a random port
    pub async fn new() -> Self {
        let root = TempDir::new().expect("Failed to create pipeline root");
        let registry = Arc::new(InMemoryRegistry::new());
        let publisher = Arc::new(BroadcastEventPublisher::new(64));

        let services = ServiceRegistryBuilder::new()
            .registry(registry.clone())
            .publisher(publisher.clone())
            .config(PipelineConfig::rooted_at(root.path()))
            .build()
            .expect("Failed to create services");
        let app = build_api_server(services);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let address = listener.local_addr().expect("Failed to get local address");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to start test server");
        });

        Self {
            address: format!("http://{}", address),
            root,
            registry,
            publisher,
        }
    }

    /// Absolute URL of a path on the server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build client")
    }

    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.publisher.subscribe()
    }

    /// POST an import request
    pub async fn import(&self, body: &Value) -> reqwest::Response {
        self.import_as(body, None).await
    }

    /// POST an import request on behalf of a user
    pub async fn import_as(&self, body: &Value, user: Option<&str>) -> reqwest::Response {
        let mut request = self.client().post(self.url("/v1/models/register")).json(body);
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        request.send().await.expect("Failed to send request")
    }

    /// GET a path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client()
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub fn temp_root(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    /// Number of entries left in the scratch root
    pub fn temp_entries(&self) -> usize {
        fs::read_dir(self.temp_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn model_count(&self) -> i64 {
        self.registry
            .get_entities(&EntityFilter::Model(ModelFilter::new()))
            .await
            .expect("Failed to query registry")
            .count
    }

    pub async fn summary_is_empty(&self) -> bool {
        let summary = self.registry.summary().await.expect("Failed to read summary");
        summary.models == 0 && summary.components == 0 && summary.relationships == 0
    }
}
