use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Bounded, expiring map from idempotency key to a write-once slot
///
/// [`DedupeCache::slot`] is an atomic check-and-insert: concurrent callers
/// with the same key receive the same [`OnceCell`], and the cell runs its
/// initializer at most once. Settled entries are evicted oldest-first when
/// the cache is full and dropped once older than the TTL. A slot whose
/// initializer is still running is never evicted, so the cache may exceed
/// its capacity while that many submissions are in flight.
pub struct DedupeCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    ttl: Duration,
}

struct Inner<V> {
    slots: HashMap<String, Arc<OnceCell<V>>>,
    // insertion order, one entry per live slot
    order: VecDeque<(String, Instant)>,
}

impl<V> DedupeCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Slot for `key`, and whether it was created by this call
    pub fn slot(&self, key: &str) -> (Arc<OnceCell<V>>, bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        inner.evict_expired(now, self.ttl);

        if let Some(cell) = inner.slots.get(key) {
            return (cell.clone(), false);
        }

        while inner.slots.len() >= self.capacity {
            if !inner.evict_oldest_settled() {
                break;
            }
        }

        let cell = Arc::new(OnceCell::new());
        inner.slots.insert(key.to_string(), cell.clone());
        inner.order.push_back((key.to_string(), now));

        (cell, true)
    }

    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.evict_expired(Instant::now(), self.ttl);
        inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Inner<V> {
    fn is_settled(&self, key: &str) -> bool {
        self.slots.get(key).map_or(true, |cell| cell.initialized())
    }

    fn evict_expired(&mut self, now: Instant, ttl: Duration) {
        let expired: Vec<String> = self
            .order
            .iter()
            .take_while(|(_, inserted)| now.duration_since(*inserted) >= ttl)
            .filter(|(key, _)| self.is_settled(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.remove(&key);
        }
    }

    fn evict_oldest_settled(&mut self) -> bool {
        let oldest = self
            .order
            .iter()
            .find(|(key, _)| self.is_settled(key))
            .map(|(key, _)| key.clone());

        match oldest {
            Some(key) => {
                self.remove(&key);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &str) {
        self.slots.remove(key);
        self.order.retain(|(k, _)| k != key);
    }
}
