use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::engine::{PollConfig, PollingEngine};
use crate::observer::{Observer, PriceSnapshot, Subject, SubscriberRegistry};
use crate::price_store::PriceStore;
use crate::scheduler::Scheduler;
use crate::source::PriceSource;

/// Façade over the registry, the price store and the polling engine.
///
/// Callers add and remove symbols of interest and subscribe observers; every
/// successful fetch fans the fresh snapshot out to all subscribers.
pub struct Listener {
    registry: Arc<SubscriberRegistry>,
    store: Arc<PriceStore>,
    engine: Arc<PollingEngine>,
}

impl Listener {
    pub fn new(
        source: Arc<dyn PriceSource>,
        scheduler: Arc<dyn Scheduler>,
        config: PollConfig,
    ) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(config.notify_timeout));
        let store = Arc::new(PriceStore::new());
        let engine = Arc::new(PollingEngine::new(
            config,
            source,
            scheduler,
            Arc::clone(&store),
            Arc::clone(&registry),
        ));

        Self {
            registry,
            store,
            engine,
        }
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Start tracking a symbol. `activate_at = None` means now.
    /// Returns true if it was newly added.
    pub async fn add_symbol(
        &self,
        symbol: &str,
        activate_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<bool> {
        let symbol = Self::normalize(symbol);
        if symbol.is_empty() {
            anyhow::bail!("symbol must not be empty");
        }
        self.engine
            .add_symbol(&symbol, activate_at.unwrap_or_else(Utc::now))
            .await
    }

    /// Stop tracking a symbol. Returns true if it was tracked.
    pub async fn remove_symbol(&self, symbol: &str) -> anyhow::Result<bool> {
        self.engine.remove_symbol(&Self::normalize(symbol)).await
    }

    /// Currently tracked symbols.
    pub async fn symbols(&self) -> Vec<String> {
        self.engine.symbols().await
    }

    /// Snapshot of the last-known prices.
    pub fn prices(&self) -> PriceSnapshot {
        self.store.snapshot()
    }

    /// Stop all poll cycles. Used on shutdown.
    pub async fn shutdown(&self) {
        self.engine.clear().await;
    }
}

#[async_trait]
impl Subject for Listener {
    fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.registry.subscribe(observer);
    }

    fn unsubscribe(&self, observer: &Arc<dyn Observer>) {
        self.registry.unsubscribe(observer);
    }

    async fn notify_all(&self, snapshot: &PriceSnapshot) {
        self.registry.notify_all(snapshot).await;
    }
}
