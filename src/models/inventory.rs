// Fleet inventory models (services and their instances)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Instance lifecycle state; anything other than "live" collapses to `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    #[default]
    Live,
    #[serde(other)]
    Other,
}

/// A running service instance as reported by the inventory feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "name")]
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub state: EntityState,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Entity {
    pub fn is_live(&self) -> bool {
        self.state == EntityState::Live
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub protocol: String,
    /// `/api/services` calls them `instances`, `/api/<service>/` calls them `children`.
    #[serde(default, alias = "children")]
    pub instances: Vec<Entity>,
}

/// Pushed to `/ws/fleet` clients after each inventory refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetUpdate {
    pub timestamp: u64,
    pub services: std::sync::Arc<Vec<Service>>,
    pub hero: std::sync::Arc<HashMap<String, f64>>,
}

/// `k1=v1, k2=v2` in key order.
pub fn labels_display<'a>(labels: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    labels
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Container-style ids are long; keep the first 12 characters.
pub fn truncate_id(id: &str) -> String {
    match id.char_indices().nth(12) {
        Some((cut, _)) => format!("{}...", &id[..cut]),
        None => id.to_string(),
    }
}
