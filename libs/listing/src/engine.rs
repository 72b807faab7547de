use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::observer::{Subject, SubscriberRegistry};
use crate::price_store::PriceStore;
use crate::scheduler::{ScheduleHandle, ScheduledAction, Scheduler};
use crate::source::{FetchError, PriceSource};

/// Timing knobs for poll cycles.
///
/// The fetch timeout must be strictly shorter than the interval, so one
/// cycle can never overlap the next.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub notify_timeout: Duration,
}

impl PollConfig {
    pub fn new(
        interval: Duration,
        fetch_timeout: Duration,
        notify_timeout: Duration,
    ) -> anyhow::Result<Self> {
        if fetch_timeout >= interval {
            anyhow::bail!(
                "fetch timeout {:?} must be strictly shorter than poll interval {:?}",
                fetch_timeout,
                interval
            );
        }
        Ok(Self {
            interval,
            fetch_timeout,
            notify_timeout,
        })
    }
}

/// Transient per-symbol state while the symbol is tracked.
struct PollCycle {
    handle: ScheduleHandle,
    /// Cleared on removal; a fetch completing afterwards discards its result.
    active: Arc<AtomicBool>,
}

/// Runs one bounded fetch-update-notify cycle per tracked symbol on a
/// schedule. Cycles for different symbols are independent; a slow symbol
/// never stalls the others.
pub struct PollingEngine {
    config: PollConfig,
    source: Arc<dyn PriceSource>,
    scheduler: Arc<dyn Scheduler>,
    store: Arc<PriceStore>,
    registry: Arc<SubscriberRegistry>,
    cycles: Mutex<HashMap<String, PollCycle>>,
}

impl PollingEngine {
    pub fn new(
        config: PollConfig,
        source: Arc<dyn PriceSource>,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<PriceStore>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            config,
            source,
            scheduler,
            store,
            registry,
            cycles: Mutex::new(HashMap::new()),
        }
    }

    /// Start polling a symbol, first cycle due at `activate_at`.
    /// Returns false if the symbol is already tracked.
    pub async fn add_symbol(
        &self,
        symbol: &str,
        activate_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut cycles = self.cycles.lock().await;
        if cycles.contains_key(symbol) {
            debug!(%symbol, "already tracked");
            return Ok(false);
        }

        let active = Arc::new(AtomicBool::new(true));
        let in_flight = Arc::new(AtomicBool::new(false));

        let action: ScheduledAction = {
            let symbol = symbol.to_string();
            let source = Arc::clone(&self.source);
            let store = Arc::clone(&self.store);
            let registry = Arc::clone(&self.registry);
            let active = Arc::clone(&active);
            let in_flight = Arc::clone(&in_flight);
            let fetch_timeout = self.config.fetch_timeout;

            Arc::new(move || {
                let cycle = run_cycle(
                    symbol.clone(),
                    Arc::clone(&source),
                    Arc::clone(&store),
                    Arc::clone(&registry),
                    Arc::clone(&active),
                    Arc::clone(&in_flight),
                    fetch_timeout,
                );
                Box::pin(cycle) as Pin<Box<dyn Future<Output = ()> + Send>>
            })
        };

        let handle = self
            .scheduler
            .schedule_repeating(activate_at, self.config.interval, action)
            .await
            .with_context(|| format!("failed to schedule poll cycle for {symbol}"))?;

        cycles.insert(symbol.to_string(), PollCycle { handle, active });

        info!(%symbol, %activate_at, "started poll cycle");
        Ok(true)
    }

    /// Stop polling a symbol and drop its price. Untracked symbols are a
    /// no-op. Returns false if the symbol was not tracked.
    pub async fn remove_symbol(&self, symbol: &str) -> anyhow::Result<bool> {
        let mut cycles = self.cycles.lock().await;
        let Some(cycle) = cycles.remove(symbol) else {
            debug!(%symbol, "remove for untracked symbol ignored");
            return Ok(false);
        };

        // Flip first so an in-flight fetch discards its result. The store
        // entry goes away even when cancellation fails: the symbol is already
        // untracked, and an orphaned price would leak into every snapshot.
        cycle.active.store(false, Ordering::Release);
        let cancelled = self.scheduler.cancel(cycle.handle).await;
        self.store.delete(symbol);
        cancelled.with_context(|| format!("failed to cancel poll cycle for {symbol}"))?;

        info!(%symbol, "stopped poll cycle");
        Ok(true)
    }

    pub async fn is_tracked(&self, symbol: &str) -> bool {
        self.cycles.lock().await.contains_key(symbol)
    }

    pub async fn symbols(&self) -> Vec<String> {
        self.cycles.lock().await.keys().cloned().collect()
    }

    /// Remove every tracked symbol. Used on shutdown; a cycle that fails to
    /// cancel must not leave the remaining cycles running.
    pub async fn clear(&self) {
        let symbols = self.symbols().await;
        for symbol in symbols {
            if let Err(e) = self.remove_symbol(&symbol).await {
                warn!(%symbol, error = %e, "failed to stop poll cycle during shutdown");
            }
        }
    }
}

/// One tick: bounded fetch, store write, fan-out. Timeouts and fetch errors
/// are reported and leave the store untouched; the next tick retries.
async fn run_cycle(
    symbol: String,
    source: Arc<dyn PriceSource>,
    store: Arc<PriceStore>,
    registry: Arc<SubscriberRegistry>,
    active: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    fetch_timeout: Duration,
) {
    if !active.load(Ordering::Acquire) {
        return;
    }
    if in_flight.swap(true, Ordering::AcqRel) {
        warn!(%symbol, "previous fetch still running, skipping tick");
        return;
    }

    let result = match tokio::time::timeout(fetch_timeout, source.fetch_price(&symbol)).await {
        Ok(inner) => inner,
        Err(_) => Err(FetchError::Timeout(fetch_timeout)),
    };

    match result {
        Ok(price) => {
            // Stale-write guard: the symbol may have been removed while the
            // fetch was in flight. The check runs under the store's lock so
            // a removal cannot slip in between it and the write.
            let wrote = store.set_if(&symbol, price, || active.load(Ordering::Acquire));
            if wrote {
                let snapshot = store.snapshot();
                debug!(%symbol, price, "price updated");
                registry.notify_all(&snapshot).await;
            } else {
                debug!(%symbol, "symbol removed mid-fetch, result discarded");
            }
        }
        Err(e) => {
            warn!(%symbol, error = %e, "price fetch failed, retrying on next tick");
        }
    }

    in_flight.store(false, Ordering::Release);
}
