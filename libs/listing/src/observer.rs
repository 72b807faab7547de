use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// Immutable copy of the price mapping at one instant.
pub type PriceSnapshot = HashMap<String, f64>;

/// Capability implemented by anyone who wants price updates.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn on_price_update(&self, snapshot: PriceSnapshot) -> anyhow::Result<()>;
}

/// Subject side of the contract: manage subscribers, fan updates out.
#[async_trait]
pub trait Subject {
    /// Register an observer. Registering the same `Arc` twice is a no-op, so
    /// a duplicate subscribe never causes double notification.
    fn subscribe(&self, observer: Arc<dyn Observer>);

    /// Remove an observer. Unknown observers are ignored.
    fn unsubscribe(&self, observer: &Arc<dyn Observer>);

    async fn notify_all(&self, snapshot: &PriceSnapshot);
}

/// Current set of subscribers.
///
/// Notification iterates over a copy of the set taken under the lock, so a
/// concurrent subscribe/unsubscribe only affects later notifications. Observer
/// identity is `Arc` pointer identity.
pub struct SubscriberRegistry {
    observers: Mutex<Vec<Arc<dyn Observer>>>,
    notify_timeout: Duration,
}

impl SubscriberRegistry {
    pub fn new(notify_timeout: Duration) -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            notify_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .expect("subscriber registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Subject for SubscriberRegistry {
    fn subscribe(&self, observer: Arc<dyn Observer>) {
        let mut observers = self
            .observers
            .lock()
            .expect("subscriber registry lock poisoned");
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    fn unsubscribe(&self, observer: &Arc<dyn Observer>) {
        let mut observers = self
            .observers
            .lock()
            .expect("subscriber registry lock poisoned");
        observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    async fn notify_all(&self, snapshot: &PriceSnapshot) {
        let targets: Vec<Arc<dyn Observer>> = {
            let observers = self
                .observers
                .lock()
                .expect("subscriber registry lock poisoned");
            observers.clone()
        };

        for (idx, observer) in targets.iter().enumerate() {
            let delivery = observer.on_price_update(snapshot.clone());
            match tokio::time::timeout(self.notify_timeout, delivery).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    // one bad observer must not starve the rest
                    warn!(observer = idx, error = %e, "observer rejected price update");
                }
                Err(_) => {
                    warn!(
                        observer = idx,
                        timeout = ?self.notify_timeout,
                        "observer too slow, delivery abandoned"
                    );
                }
            }
        }
    }
}
