//! Initialization registry.
//!
//! Tracks which physical databases were dropped, recreated and migrated in
//! this process. Entries are never removed.
//!
//! Each name also has its own async lock. Holding it across the
//! check-then-initialize step makes concurrent first requests for one name
//! initialize once, while first requests for different names proceed in
//! parallel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct Registry {
    initialized: Mutex<HashSet<String>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, database: &str) -> bool {
        self.initialized
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(database)
    }

    /// Record `database` as initialized. Returns false if it already was.
    pub fn record(&self, database: impl Into<String>) -> bool {
        self.initialized
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(database.into())
    }

    /// Wait for exclusive use of `database`'s initialization slot.
    pub async fn lock_name(&self, database: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(database.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
