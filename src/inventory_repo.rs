// Fleet inventory via the inventory feed's HTTP API.
// Each successful fetch replaces the held snapshot wholesale.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::instrument;

use crate::models::Service;
use crate::prom_repo::FetchError;

pub struct InventoryRepo {
    client: reqwest::Client,
    base_url: String,
    current: RwLock<Arc<Vec<Service>>>,
}

impl InventoryRepo {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            current: RwLock::new(Arc::new(Vec::new())),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET /api/services, without touching the held snapshot.
    #[instrument(skip(self), fields(repo = "inventory", operation = "list_services"))]
    pub async fn list_services(&self) -> Result<Vec<Service>, FetchError> {
        self.get_json("/api/services").await
    }

    /// GET /api/<service>/ (the per-service endpoint may omit the name)
    #[instrument(skip(self), fields(repo = "inventory", operation = "get_service"))]
    pub async fn get_service(&self, name: &str) -> Result<Service, FetchError> {
        let mut service: Service = self.get_json(&format!("/api/{name}/")).await?;
        if service.name.is_empty() {
            service.name = name.to_string();
        }
        Ok(service)
    }

    /// Fetches all services and swaps them in. On failure the previous snapshot stays.
    pub async fn refresh(&self) -> Result<Arc<Vec<Service>>, FetchError> {
        let services = Arc::new(self.list_services().await?);
        *self.current.write().await = services.clone();
        Ok(services)
    }

    pub async fn current(&self) -> Arc<Vec<Service>> {
        self.current.read().await.clone()
    }

    /// Installs a snapshot obtained elsewhere (startup seed, tests).
    pub async fn replace(&self, services: Vec<Service>) {
        *self.current.write().await = Arc::new(services);
    }
}

/// Ids of every live entity across `services`, in inventory order.
pub fn live_entity_ids(services: &[Service]) -> Vec<String> {
    services
        .iter()
        .flat_map(|s| s.instances.iter())
        .filter(|e| e.is_live())
        .map(|e| e.id.clone())
        .collect()
}
