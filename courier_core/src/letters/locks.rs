use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutexes keyed by tracking number.
///
/// Holding the guard serializes fetch + reconcile for one letter, so a single-letter refresh
/// and a bulk refresh task cannot interleave "load latest" and "write" for the same letter.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out before awaiting so no DashMap shard guard is held across the await.
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the entry for `key` unless a task still holds or waits on its mutex.
    ///
    /// Call after releasing the guard. A waiter keeps the entry alive so later lockers
    /// queue on the same mutex.
    pub fn forget(&self, key: &str) {
        self.locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
