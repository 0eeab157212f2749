// Prometheus HTTP API response envelope.
// `result` entries stay as raw JSON so one malformed entry never poisons the others.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    #[serde(default)]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<serde_json::Value>,
}

impl QueryResponse {
    /// Result entries, or an empty slice when `data.result` is absent.
    pub fn entries(&self) -> &[serde_json::Value] {
        self.data.as_ref().map(|d| d.result.as_slice()).unwrap_or(&[])
    }
}

/// One entry of a `matrix` result.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeSample {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    pub values: Vec<(f64, String)>,
}

/// One entry of a `vector` result.
#[derive(Debug, Clone, Deserialize)]
pub struct InstantSample {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    pub value: (f64, String),
}
