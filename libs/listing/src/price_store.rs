use std::collections::HashMap;
use std::sync::Mutex;

use crate::observer::PriceSnapshot;

/// Last-known price per tracked symbol.
///
/// Single mutation boundary: the polling engine writes on successful fetches,
/// deletes on symbol removal. The lock is never held across an await.
#[derive(Default)]
pub struct PriceStore {
    prices: Mutex<HashMap<String, f64>>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: &str, price: f64) {
        let mut prices = self.prices.lock().expect("price store lock poisoned");
        prices.insert(symbol.to_string(), price);
    }

    /// Insert only while `tracked` still holds. The check runs under the same
    /// lock `delete` takes, so a removal cannot interleave between the check
    /// and the write. Returns whether the write happened.
    pub fn set_if<F>(&self, symbol: &str, price: f64, tracked: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let mut prices = self.prices.lock().expect("price store lock poisoned");
        if !tracked() {
            return false;
        }
        prices.insert(symbol.to_string(), price);
        true
    }

    /// Returns true if the symbol had an entry.
    pub fn delete(&self, symbol: &str) -> bool {
        let mut prices = self.prices.lock().expect("price store lock poisoned");
        prices.remove(symbol).is_some()
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        let prices = self.prices.lock().expect("price store lock poisoned");
        prices.get(symbol).copied()
    }

    /// Point-in-time copy of the whole mapping.
    pub fn snapshot(&self) -> PriceSnapshot {
        let prices = self.prices.lock().expect("price store lock poisoned");
        prices.clone()
    }

    pub fn len(&self) -> usize {
        let prices = self.prices.lock().expect("price store lock poisoned");
        prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_snapshot_copies() {
        let store = PriceStore::new();
        store.set("BTCUSDT", 65000.0);
        store.set("BTCUSDT", 65100.0);

        let snap = store.snapshot();
        assert_eq!(snap.get("BTCUSDT"), Some(&65100.0));

        // the snapshot is detached from later mutations
        store.set("BTCUSDT", 66000.0);
        assert_eq!(snap.get("BTCUSDT"), Some(&65100.0));
        assert_eq!(store.get("BTCUSDT"), Some(66000.0));
    }

    #[test]
    fn set_if_respects_condition() {
        let store = PriceStore::new();

        assert!(!store.set_if("BTCUSDT", 65000.0, || false));
        assert_eq!(store.get("BTCUSDT"), None);

        assert!(store.set_if("BTCUSDT", 65000.0, || true));
        assert_eq!(store.get("BTCUSDT"), Some(65000.0));
    }

    #[test]
    fn delete_reports_presence() {
        let store = PriceStore::new();
        store.set("ETHUSDT", 3000.0);

        assert!(store.delete("ETHUSDT"));
        assert!(!store.delete("ETHUSDT"));
        assert!(store.is_empty());
    }
}
