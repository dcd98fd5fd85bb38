#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use milyst_api::config::{AppConfig, Environment};
use milyst_api::database::{MemoryRecordStore, RecordStore};
use milyst_api::{app, AppState};
use reqwest::StatusCode;

pub const TENANT_HEADER: &str = "X-Tenant-Id";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Serve the app in-process on an unused port, backed by the given store
    pub async fn spawn(store: Arc<dyn RecordStore>) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::for_environment(Environment::Production);
        config.api.port = port;
        config.frontend.static_dir = "tests/fixtures/wwwroot".to_string();

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let router = app(AppState::new(config, store));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    pub async fn with_memory_store() -> Result<(Self, MemoryRecordStore)> {
        let store = MemoryRecordStore::new();
        let server = Self::spawn(Arc::new(store.clone())).await?;
        Ok((server, store))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create_record(&self, tenant: Option<&str>, value: &str) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(self.url("/api/sample/records"))
            .json(&serde_json::json!({ "value": value }));
        if let Some(tenant) = tenant {
            request = request.header(TENANT_HEADER, tenant);
        }
        Ok(request.send().await?)
    }

    pub async fn list_records(&self, tenant: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self.client.get(self.url("/api/sample/records"));
        if let Some(tenant) = tenant {
            request = request.header(TENANT_HEADER, tenant);
        }
        Ok(request.send().await?)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/api/health")).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}
