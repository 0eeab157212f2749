// Instance grouping by an ordered set of label keys, plus per-group hero aggregates.
//
// Group keys are JSON objects in request-key order, e.g. `{"image":"nginx","tag":null}`.
// A missing label serializes as `null`, so it can never collide with an empty-string value.

use std::collections::HashMap;

use serde::Serialize;

use crate::matcher::Selector;
use crate::models::Entity;

/// A label as projected onto a grouping key: `None` when the entity lacks it.
pub type ProjectedLabel = (String, Option<String>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub key: String,
    pub labels: Vec<ProjectedLabel>,
    pub members: Vec<Entity>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|e| e.id.as_str())
    }

    /// Selects exactly this group's members by their id label.
    pub fn selector(&self, entity_label: &str) -> Selector {
        Selector::new().any_of(entity_label, self.member_ids())
    }

    /// Aggregates over members that `lookup` resolves; members without a value are skipped.
    pub fn stats(&self, lookup: impl Fn(&str) -> Option<f64>) -> GroupStats {
        GroupStats::from_values(self.member_ids().filter_map(lookup))
    }
}

/// Groups in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Grouping {
    pub keys: Vec<String>,
    pub groups: Vec<Group>,
}

impl Grouping {
    pub fn get(&self, key: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Partitions `entities` by their projection onto `keys`. Empty `keys` puts every entity in
/// its own group; repeated keys count once.
pub fn group(entities: &[Entity], keys: &[String]) -> Grouping {
    let mut uniq: Vec<String> = Vec::with_capacity(keys.len());
    for k in keys {
        if !uniq.contains(k) {
            uniq.push(k.clone());
        }
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for entity in entities {
        let labels = project(entity, &uniq);
        let key = if uniq.is_empty() {
            canonical_key(&[("id".to_string(), Some(entity.id.clone()))])
        } else {
            canonical_key(&labels)
        };
        match index.get(&key) {
            Some(&i) => groups[i].members.push(entity.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    labels,
                    members: vec![entity.clone()],
                });
            }
        }
    }
    Grouping { keys: uniq, groups }
}

fn project(entity: &Entity, keys: &[String]) -> Vec<ProjectedLabel> {
    keys.iter()
        .map(|k| (k.clone(), entity.label(k).map(str::to_string)))
        .collect()
}

/// `{"k1":"v1","k2":null}` with keys in the given order.
pub fn canonical_key(labels: &[ProjectedLabel]) -> String {
    let fields: Vec<String> = labels
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Some(v) => serde_json::Value::String(v.clone()),
                None => serde_json::Value::Null,
            };
            format!("{}:{}", serde_json::Value::String(k.clone()), v)
        })
        .collect();
    format!("{{{}}}", fields.join(","))
}

/// Aggregate of a metric over a group's resolvable members.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GroupStats {
    NoData,
    Values {
        avg: f64,
        min: f64,
        max: f64,
        count: usize,
    },
}

impl GroupStats {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return GroupStats::NoData;
        }
        GroupStats::Values {
            avg: sum / count as f64,
            min,
            max,
            count,
        }
    }
}
