//! In-process keyed mutexes serializing read-modify-write sequences on a
//! single aggregate (one plate, one session). The flat-file store itself
//! stays last-write-wins; these locks close the race between two requests
//! touching the same aggregate inside one process.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use. Entries are
    /// retained for the process lifetime; the map is bounded by the number
    /// of distinct plates and sessions seen.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
