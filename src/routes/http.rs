// GET handlers: version, inventory, groupings, hero values

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::grouping::{Group, GroupStats, group};
use crate::matcher::build_match_expression;
use crate::models::{Service, labels_display, truncate_id};
use crate::prom_repo::{FetchError, MetricsSource};

/// Package version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
const NAME: &str = env!("CARGO_PKG_NAME");

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/services: latest inventory snapshot.
pub(super) async fn services_handler<S: MetricsSource>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    Json(state.inventory_repo.current().await)
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupsQuery {
    /// Comma-separated label keys; absent or empty means one group per instance.
    #[serde(default)]
    by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelView {
    key: String,
    value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupView {
    key: String,
    display: String,
    labels: Vec<LabelView>,
    members: Vec<String>,
    match_expression: String,
    stats: GroupStats,
}

impl GroupView {
    fn new(group: &Group, entity_label: &str, stats: GroupStats) -> Self {
        // ungrouped: one member, no labels
        let display = match group.members.as_slice() {
            [only] if group.labels.is_empty() => truncate_id(&only.id),
            _ => labels_display(
                group
                    .labels
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_deref().unwrap_or("-"))),
            ),
        };
        Self {
            key: group.key.clone(),
            display,
            labels: group
                .labels
                .iter()
                .map(|(k, v)| LabelView {
                    key: k.clone(),
                    value: v.clone(),
                })
                .collect(),
            members: group.member_ids().map(str::to_string).collect(),
            match_expression: build_match_expression(&group.selector(entity_label)),
            stats,
        }
    }
}

/// GET /api/services/{name}/groups?by=image,tag: instances of one service grouped by labels.
pub(super) async fn groups_handler<S: MetricsSource>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
    Query(query): Query<GroupsQuery>,
) -> Response {
    let service = match find_service(&state, &name).await {
        Ok(s) => s,
        Err(FetchError::Status(404)) => {
            return (StatusCode::NOT_FOUND, format!("unknown service {name}")).into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, operation = "get_service", service = %name, "service lookup failed");
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let keys: Vec<String> = query
        .by
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    let grouping = group(&service.instances, &keys);
    let hero = state.snapshot_cache.snapshot().await;
    let entity_label = &state.config.prometheus.entity_label;
    let groups: Vec<GroupView> = grouping
        .groups
        .iter()
        .map(|g| GroupView::new(g, entity_label, g.stats(|id| hero.get(id).copied())))
        .collect();
    Json(serde_json::json!({
        "service": service.name,
        "keys": grouping.keys,
        "groups": groups,
    }))
    .into_response()
}

/// Held snapshot first; the inventory feed only for services it has not listed yet.
async fn find_service<S: MetricsSource>(
    state: &AppState<S>,
    name: &str,
) -> Result<Service, FetchError> {
    let services = state.inventory_repo.current().await;
    if let Some(s) = services.iter().find(|s| s.name == name) {
        return Ok(s.clone());
    }
    state.inventory_repo.get_service(name).await
}

/// GET /api/hero: every cached hero value.
pub(super) async fn hero_handler<S: MetricsSource>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    Json(state.snapshot_cache.snapshot().await)
}

/// GET /api/hero/{id}: `value` is null when there is no data for the instance.
pub(super) async fn hero_entity_handler<S: MetricsSource>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let value = state.snapshot_cache.get(&id).await;
    Json(serde_json::json!({ "id": id, "value": value }))
}
