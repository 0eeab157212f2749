use anyhow::Result;
use fluxboard::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let (tx, _) =
        broadcast::channel::<models::FleetUpdate>(app_config.publishing.broadcast_capacity);

    let prom_repo = Arc::new(prom_repo::PromRepo::new(&app_config.prometheus.url)?);
    let inventory_repo = Arc::new(inventory_repo::InventoryRepo::new(&app_config.inventory.url)?);
    let snapshot_cache = Arc::new(snapshot_cache::SnapshotCache::new(
        prom_repo.clone(),
        &app_config.prometheus.metric,
        &app_config.prometheus.entity_label,
        app_config.charts.interval_secs,
    ));
    let scheduler = scheduler::Scheduler::new(
        prom_repo.clone(),
        scheduler::SchedulerConfig {
            metric: app_config.prometheus.metric.clone(),
            interval_secs: app_config.charts.interval_secs,
            window_secs: app_config.charts.window_secs,
            series: app_config.charts.series.clone(),
        },
    )?;
    tracing::info!(
        prometheus = %prom_repo.base_url(),
        interval_secs = app_config.charts.interval_secs,
        window_secs = app_config.charts.window_secs,
        "metrics store configured"
    );

    let ws_fleet_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            inventory_repo: inventory_repo.clone(),
            snapshot_cache: snapshot_cache.clone(),
            scheduler: scheduler.clone(),
            tx: tx.clone(),
            ws_fleet_connections: ws_fleet_connections.clone(),
            refreshes_total: Arc::new(AtomicU64::new(0)),
            shutdown_rx,
        },
        worker::WorkerConfig {
            refresh_interval_secs: app_config.inventory.refresh_interval_secs,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    let app = routes::app(
        routes::AppDeps {
            fleet_tx: tx,
            inventory_repo,
            snapshot_cache,
            scheduler,
            ws_fleet_connections,
        },
        app_config.clone(),
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = worker_handle.await;
        }
    }

    Ok(())
}
