// Clock-aligned poller: one fetch-and-merge loop per chart subscription.
// Every subscription wakes on the same global grid of `interval_secs` slots, so charts that
// were mounted at different times still hit the metrics store together.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::matcher::{RangeQuery, Selector, build_match_expression};
use crate::prom_repo::MetricsSource;
use crate::series::{ChartSeries, SeriesCodes, partition_by_code};

/// Start of the slot containing `now_secs`. `interval_secs` must be non-zero.
pub fn aligned_slot(now_secs: i64, interval_secs: u64) -> i64 {
    let interval = interval_secs as i64;
    now_secs.div_euclid(interval) * interval
}

/// Milliseconds from `now_ms` until the start of the next slot. Always in `(0, interval * 1000]`.
pub fn next_slot_delay_ms(now_ms: i64, interval_secs: u64) -> u64 {
    let now_secs = now_ms.div_euclid(1000);
    let next_slot_ms = (aligned_slot(now_secs, interval_secs) + interval_secs as i64) * 1000;
    (next_slot_ms - now_ms) as u64
}

pub fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

/// Poll cadence and chart shape shared by every subscription.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub metric: String,
    /// Slot width; must be > 0.
    pub interval_secs: u64,
    pub window_secs: u64,
    pub series: Vec<SeriesCodes>,
}

/// Hands out chart subscriptions against one metrics source.
pub struct Scheduler<S> {
    source: Arc<S>,
    config: Arc<SchedulerConfig>,
    active: Arc<AtomicUsize>,
    cycles_total: Arc<AtomicU64>,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config: self.config.clone(),
            active: self.active.clone(),
            cycles_total: self.cycles_total.clone(),
        }
    }
}

impl<S: MetricsSource> Scheduler<S> {
    pub fn new(source: Arc<S>, config: SchedulerConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            config.interval_secs > 0,
            "interval_secs must be > 0, got {}",
            config.interval_secs
        );
        Ok(Self {
            source,
            config: Arc::new(config),
            active: Arc::new(AtomicUsize::new(0)),
            cycles_total: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of subscriptions not yet torn down.
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Completed fetch cycles across all subscriptions (failed fetches included).
    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    /// Starts polling for `selector`. The returned handle owns the loop: dropping it tears it down.
    pub fn subscribe(&self, selector: Selector) -> Subscription {
        let cancel = CancellationToken::new();
        let initial = ChartSeries::new(&self.config.series, self.config.window_secs);
        let (tx, rx) = watch::channel(Arc::new(initial.clone()));
        let state = CycleState {
            selector,
            series: initial,
            consumed_through: None,
        };
        let span = tracing::debug_span!(
            "subscription",
            selector = %build_match_expression(&state.selector)
        );
        self.active.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(
            run(
                self.source.clone(),
                self.config.clone(),
                state,
                cancel.clone(),
                tx,
                self.cycles_total.clone(),
            )
            .instrument(span),
        );
        Subscription {
            cancel,
            updates: rx,
            active: self.active.clone(),
        }
    }
}

/// Everything one subscription mutates, threaded through each cycle.
struct CycleState {
    selector: Selector,
    series: ChartSeries,
    /// End of the last successful fetch; `None` until the first one lands.
    /// Sub-series cursors only guard merging: one that never receives points must not hold
    /// the fetch range open.
    consumed_through: Option<i64>,
}

impl CycleState {
    /// `[start, end]` for a fetch issued at `now_secs`, never wider than one window.
    fn fetch_range(&self, now_secs: i64, window_secs: u64) -> (i64, i64) {
        let window_start = now_secs - window_secs as i64;
        let start = match self.consumed_through {
            Some(consumed) => consumed.clamp(window_start, now_secs),
            None => window_start,
        };
        (start, now_secs)
    }
}

async fn run<S: MetricsSource>(
    source: Arc<S>,
    config: Arc<SchedulerConfig>,
    mut state: CycleState,
    cancel: CancellationToken,
    tx: watch::Sender<Arc<ChartSeries>>,
    cycles_total: Arc<AtomicU64>,
) {
    loop {
        let (start, end) = state.fetch_range(unix_now_ms().div_euclid(1000), config.window_secs);
        let query = RangeQuery::code_rates(
            &config.metric,
            &state.selector,
            config.interval_secs,
            start,
            end,
        );

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = source.query_range(&query) => r,
        };
        cycles_total.fetch_add(1, Ordering::Relaxed);
        // the response may land in the same wakeup as teardown
        if cancel.is_cancelled() {
            break;
        }

        match fetched {
            Ok(resp) => {
                let result = partition_by_code(&resp, &config.series);
                let accepted = state.series.merge(&result);
                // the first success seeds every sub-series to this fetch's end
                let seeded = state.consumed_through.is_none();
                if seeded {
                    state.series.seed_cursor(end);
                }
                state.consumed_through = Some(end);
                tracing::debug!(
                    operation = "merge",
                    accepted,
                    consumed_through = end,
                    "fetch merged"
                );
                // retransmit-only cycles change nothing, so readers are not woken
                if accepted > 0 || seeded {
                    tx.send_replace(Arc::new(state.series.clone()));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "query_range", "fetch failed; skipping cycle");
            }
        }

        let delay = next_slot_delay_ms(unix_now_ms(), config.interval_secs);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }
    }
    tracing::debug!("subscription torn down");
}

/// Handle to a running chart subscription.
pub struct Subscription {
    cancel: CancellationToken,
    updates: watch::Receiver<Arc<ChartSeries>>,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    /// Latest merged series.
    pub fn current(&self) -> Arc<ChartSeries> {
        self.updates.borrow().clone()
    }

    /// A receiver that wakes after every merge.
    pub fn updates(&self) -> watch::Receiver<Arc<ChartSeries>> {
        self.updates.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancels the pending timer and marks the subscription inactive. Idempotent.
    pub fn teardown(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            self.active.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}
