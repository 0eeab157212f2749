// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::inventory_repo::InventoryRepo;
use crate::models::FleetUpdate;
use crate::prom_repo::MetricsSource;
use crate::scheduler::Scheduler;
use crate::snapshot_cache::SnapshotCache;

pub(crate) struct AppState<S> {
    pub(crate) fleet_tx: broadcast::Sender<FleetUpdate>,
    pub(crate) inventory_repo: Arc<InventoryRepo>,
    pub(crate) snapshot_cache: Arc<SnapshotCache<S>>,
    pub(crate) scheduler: Scheduler<S>,
    pub(crate) ws_fleet_connections: Arc<AtomicUsize>,
    pub(crate) config: AppConfig,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            fleet_tx: self.fleet_tx.clone(),
            inventory_repo: self.inventory_repo.clone(),
            snapshot_cache: self.snapshot_cache.clone(),
            scheduler: self.scheduler.clone(),
            ws_fleet_connections: self.ws_fleet_connections.clone(),
            config: self.config.clone(),
        }
    }
}

/// Shared handles the router serves from.
pub struct AppDeps<S> {
    pub fleet_tx: broadcast::Sender<FleetUpdate>,
    pub inventory_repo: Arc<InventoryRepo>,
    pub snapshot_cache: Arc<SnapshotCache<S>>,
    pub scheduler: Scheduler<S>,
    pub ws_fleet_connections: Arc<AtomicUsize>,
}

pub fn app<S: MetricsSource>(deps: AppDeps<S>, config: AppConfig) -> Router {
    let state = AppState {
        fleet_tx: deps.fleet_tx,
        inventory_repo: deps.inventory_repo,
        snapshot_cache: deps.snapshot_cache,
        scheduler: deps.scheduler,
        ws_fleet_connections: deps.ws_fleet_connections,
        config,
    };
    Router::new()
        .route("/", get(|| async { "fluxboard: fleet metrics engine" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/services", get(http::services_handler::<S>)) // GET /api/services
        .route(
            "/api/services/{name}/groups",
            get(http::groups_handler::<S>),
        ) // GET /api/services/{name}/groups?by=k1,k2
        .route("/api/hero", get(http::hero_handler::<S>)) // GET /api/hero
        .route("/api/hero/{id}", get(http::hero_entity_handler::<S>)) // GET /api/hero/{id}
        .route("/ws/chart", get(ws::ws_chart::<S>)) // WS /ws/chart
        .route("/ws/fleet", get(ws::ws_fleet::<S>)) // WS /ws/fleet
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
