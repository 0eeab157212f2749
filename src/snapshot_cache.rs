// Instant "hero metric" values per entity, refreshed in one batched query.
// The map is swapped as a whole Arc, so readers see either the old or the new fetch, never a mix.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::instrument;

use crate::matcher::{Selector, rate_query};
use crate::models::InstantSample;
use crate::prom_repo::{FetchError, MetricsSource};

pub type SnapshotMap = HashMap<String, f64>;

pub struct SnapshotCache<S> {
    source: Arc<S>,
    metric: String,
    entity_label: String,
    interval_secs: u64,
    current: RwLock<Arc<SnapshotMap>>,
}

impl<S: MetricsSource> SnapshotCache<S> {
    pub fn new(source: Arc<S>, metric: &str, entity_label: &str, interval_secs: u64) -> Self {
        Self {
            source,
            metric: metric.to_string(),
            entity_label: entity_label.to_string(),
            interval_secs,
            current: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    pub fn entity_label(&self) -> &str {
        &self.entity_label
    }

    /// `sum(rate(<metric>{<label>=~"a|b"}[<i>s])) by (<label>)`
    pub fn batch_query(&self, entity_ids: &[String]) -> String {
        let selector = Selector::new().any_of(self.entity_label.as_str(), entity_ids.iter().cloned());
        rate_query(&self.metric, &selector, self.interval_secs, &self.entity_label)
    }

    /// Replaces the cache with values for `entity_ids`. On failure the previous map stays.
    #[instrument(skip(self, entity_ids), fields(repo = "snapshot_cache", operation = "refresh", entities = entity_ids.len()))]
    pub async fn refresh(&self, entity_ids: &[String]) -> Result<Arc<SnapshotMap>, FetchError> {
        let fresh = if entity_ids.is_empty() {
            HashMap::new()
        } else {
            let resp = self
                .source
                .query_instant(&self.batch_query(entity_ids))
                .await?;
            let requested: HashSet<&str> = entity_ids.iter().map(String::as_str).collect();
            let mut values = HashMap::with_capacity(entity_ids.len());
            for entry in resp.entries() {
                let Ok(sample) = serde_json::from_value::<InstantSample>(entry.clone()) else {
                    tracing::debug!("skipping malformed instant sample");
                    continue;
                };
                let Some(id) = sample.metric.get(&self.entity_label) else {
                    continue;
                };
                let Ok(value) = sample.value.1.parse::<f64>() else {
                    continue;
                };
                // ids outside this request never enter the map
                if value.is_finite() && requested.contains(id.as_str()) {
                    values.insert(id.clone(), value);
                }
            }
            values
        };
        let fresh = Arc::new(fresh);
        *self.current.write().await = fresh.clone();
        Ok(fresh)
    }

    /// The whole map from the latest completed refresh.
    pub async fn snapshot(&self) -> Arc<SnapshotMap> {
        self.current.read().await.clone()
    }

    /// `None` means no data, which is not the same as zero.
    pub async fn get(&self, entity_id: &str) -> Option<f64> {
        self.current.read().await.get(entity_id).copied()
    }
}
