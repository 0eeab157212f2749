// Shared test helpers: canned and gated metrics sources, stub HTTP servers

#![allow(dead_code)]

use fluxboard::matcher::RangeQuery;
use fluxboard::models::{Entity, EntityState, QueryResponse, Service};
use fluxboard::prom_repo::{FetchError, MetricsSource};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

fn wire_values(pts: &[(i64, &str)]) -> Vec<Value> {
    pts.iter().map(|(t, v)| json!([*t as f64, v])).collect()
}

/// `query_range` body with a `200` and a `500` series.
pub fn matrix(ok: &[(i64, &str)], err: &[(i64, &str)]) -> Value {
    json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [
                { "metric": { "code": "200" }, "values": wire_values(ok) },
                { "metric": { "code": "500" }, "values": wire_values(err) }
            ]
        }
    })
}

/// `query_range` body of a healthy service: the store returns no `500` series at all.
pub fn ok_only(ok: &[(i64, &str)]) -> Value {
    json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [ { "metric": { "code": "200" }, "values": wire_values(ok) } ]
        }
    })
}

/// `query` body with one sample per (id, value).
pub fn vector(label: &str, samples: &[(&str, &str)]) -> Value {
    let result: Vec<Value> = samples
        .iter()
        .map(|(id, v)| {
            let mut metric = serde_json::Map::new();
            metric.insert(label.to_string(), json!(id));
            json!({ "metric": metric, "value": [1000.0, v] })
        })
        .collect();
    json!({
        "status": "success",
        "data": { "resultType": "vector", "result": result }
    })
}

/// Answers from whatever body is currently installed; `None` fails like an unreachable store.
#[derive(Default)]
pub struct CannedSource {
    pub range: Mutex<Option<Value>>,
    pub instant: Mutex<Option<Value>>,
    pub range_queries: Mutex<Vec<RangeQuery>>,
    pub instant_queries: Mutex<Vec<String>>,
}

impl CannedSource {
    pub fn with_range(body: Value) -> Self {
        let s = Self::default();
        *s.range.lock().unwrap() = Some(body);
        s
    }

    pub fn with_instant(body: Value) -> Self {
        let s = Self::default();
        *s.instant.lock().unwrap() = Some(body);
        s
    }

    pub fn set_range(&self, body: Option<Value>) {
        *self.range.lock().unwrap() = body;
    }

    pub fn set_instant(&self, body: Option<Value>) {
        *self.instant.lock().unwrap() = body;
    }

    pub fn range_calls(&self) -> usize {
        self.range_queries.lock().unwrap().len()
    }
}

fn respond(body: Option<Value>) -> Result<QueryResponse, FetchError> {
    match body {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Err(FetchError::Status(503)),
    }
}

impl MetricsSource for CannedSource {
    async fn query_range(&self, query: &RangeQuery) -> Result<QueryResponse, FetchError> {
        self.range_queries.lock().unwrap().push(query.clone());
        let body = self.range.lock().unwrap().clone();
        respond(body)
    }

    async fn query_instant(&self, query: &str) -> Result<QueryResponse, FetchError> {
        self.instant_queries.lock().unwrap().push(query.to_string());
        let body = self.instant.lock().unwrap().clone();
        respond(body)
    }
}

/// Holds every range fetch until `release` is notified.
pub struct GatedSource {
    pub started: Notify,
    pub release: Notify,
    pub body: Value,
    pub calls: AtomicUsize,
}

impl GatedSource {
    pub fn new(body: Value) -> Self {
        Self {
            started: Notify::new(),
            release: Notify::new(),
            body,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MetricsSource for GatedSource {
    async fn query_range(&self, _query: &RangeQuery) -> Result<QueryResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(serde_json::from_value(self.body.clone())?)
    }

    async fn query_instant(&self, _query: &str) -> Result<QueryResponse, FetchError> {
        Ok(QueryResponse::default())
    }
}

pub fn entity(id: &str, labels: &[(&str, &str)]) -> Entity {
    Entity {
        id: id.into(),
        address: "10.0.0.1".into(),
        port: 8080,
        state: EntityState::Live,
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn service(name: &str, instances: Vec<Entity>) -> Service {
    Service {
        name: name.into(),
        address: "10.0.0.254".into(),
        port: 80,
        protocol: "http".into(),
        instances,
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
