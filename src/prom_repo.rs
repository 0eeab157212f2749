// Metrics-store client (Prometheus HTTP API) via reqwest

use std::future::Future;

use thiserror::Error;
use tracing::instrument;

use crate::matcher::RangeQuery;
use crate::models::QueryResponse;

/// Failure talking to the metrics store or the inventory feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, reset, DNS failure and the like.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The store answered with `"status": "error"`.
    #[error("query rejected: {0}")]
    Query(String),
}

/// Source of query results. `PromRepo` talks HTTP; tests plug in canned or gated sources.
pub trait MetricsSource: Send + Sync + 'static {
    fn query_range(
        &self,
        query: &RangeQuery,
    ) -> impl Future<Output = Result<QueryResponse, FetchError>> + Send;

    fn query_instant(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<QueryResponse, FetchError>> + Send;
}

pub struct PromRepo {
    client: reqwest::Client,
    base_url: String,
}

impl PromRepo {
    /// No request timeout: a slow store only delays the caller's next cycle.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<QueryResponse, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(params).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        // Prometheus reports bad queries as 400/422 with an error envelope; prefer its message.
        let parsed: Result<QueryResponse, _> = serde_json::from_slice(&body);
        match parsed {
            Ok(r) if r.status == "error" => Err(FetchError::Query(
                r.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            Ok(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            Ok(r) => Ok(r),
            Err(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            Err(e) => Err(FetchError::Decode(e)),
        }
    }
}

impl MetricsSource for PromRepo {
    #[instrument(skip(self, query), fields(repo = "prom", operation = "query_range", start = query.start, end = query.end))]
    async fn query_range(&self, query: &RangeQuery) -> Result<QueryResponse, FetchError> {
        self.get("/api/v1/query_range", &query.params()).await
    }

    #[instrument(skip(self, query), fields(repo = "prom", operation = "query_instant"))]
    async fn query_instant(&self, query: &str) -> Result<QueryResponse, FetchError> {
        self.get("/api/v1/query", &[("query", query.to_string())])
            .await
    }
}
