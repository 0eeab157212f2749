// Background fleet worker: refresh inventory, then the hero-value cache, then notify /ws/fleet.
// A failed step is logged and the loop carries on with the previous snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

use crate::inventory_repo::{InventoryRepo, live_entity_ids};
use crate::models::FleetUpdate;
use crate::prom_repo::MetricsSource;
use crate::scheduler::{Scheduler, unix_now_ms};
use crate::snapshot_cache::SnapshotCache;

/// Rate limit for "no receivers" debug line.
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Repos, channels, and shutdown for the worker.
pub struct WorkerDeps<S> {
    pub inventory_repo: Arc<InventoryRepo>,
    pub snapshot_cache: Arc<SnapshotCache<S>>,
    pub scheduler: Scheduler<S>,
    pub tx: broadcast::Sender<FleetUpdate>,
    pub ws_fleet_connections: Arc<AtomicUsize>,
    pub refreshes_total: Arc<AtomicU64>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct WorkerConfig {
    pub refresh_interval_secs: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// One inventory + cache pass. Returns the update that would be broadcast.
pub async fn refresh_once<S: MetricsSource>(
    inventory_repo: &InventoryRepo,
    snapshot_cache: &SnapshotCache<S>,
) -> FleetUpdate {
    if let Err(e) = inventory_repo.refresh().await {
        tracing::warn!(error = %e, operation = "refresh_inventory", "inventory refresh failed");
    }
    let services = inventory_repo.current().await;
    let ids = live_entity_ids(&services);
    let hero = match snapshot_cache.refresh(&ids).await {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(error = %e, operation = "refresh_snapshot_cache", "hero refresh failed");
            snapshot_cache.snapshot().await
        }
    };
    FleetUpdate {
        timestamp: unix_now_ms().max(0) as u64,
        services,
        hero,
    }
}

pub fn spawn<S: MetricsSource>(
    deps: WorkerDeps<S>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        inventory_repo,
        snapshot_cache,
        scheduler,
        tx,
        ws_fleet_connections,
        refreshes_total,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        refresh_interval_secs,
        stats_log_interval_secs,
    } = config;

    let worker_span = tracing::debug_span!("worker", refresh_interval_secs);
    tokio::spawn(
        async move {
            let mut tick = interval(Duration::from_secs(refresh_interval_secs));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut last_no_receivers_warn: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let update = refresh_once(&inventory_repo, &snapshot_cache).await;
                        refreshes_total.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            operation = "refresh_fleet",
                            services = update.services.len(),
                            hero_values = update.hero.len(),
                            "fleet refreshed"
                        );
                        if tx.send(update).is_err() {
                            let should_warn = last_no_receivers_warn
                                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                            if should_warn {
                                tracing::debug!(
                                    operation = "broadcast_fleet",
                                    "No active WebSocket clients; broadcast channel has no receivers"
                                );
                                last_no_receivers_warn = Some(Instant::now());
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Worker shutting down");
                        break;
                    }
                    _ = stats_log_tick.tick() => {
                        tracing::info!(
                            chart_subscriptions = scheduler.active_subscriptions(),
                            chart_cycles_total = scheduler.cycles_total(),
                            ws_fleet_clients = ws_fleet_connections.load(Ordering::Relaxed),
                            refreshes_total = refreshes_total.load(Ordering::Relaxed),
                            "app stats"
                        );
                    }
                }
            }
        }
        .instrument(worker_span),
    )
}
