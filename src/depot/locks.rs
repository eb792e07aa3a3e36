//! Per-filename mutual exclusion for mutating depot operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard holding one or more filename locks; released on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Registry of per-filename async locks.
///
/// Locks are created on demand and dropped from the registry once nobody
/// holds or waits on them.
#[derive(Debug, Default)]
pub struct FileLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a single filename.
    pub async fn lock(&self, filename: &str) -> FileLockGuard {
        self.lock_all(&[filename]).await
    }

    /// Lock several filenames at once.
    ///
    /// Names are deduplicated and acquired in sorted order so that two
    /// callers locking the same pair can't deadlock.
    pub async fn lock_all(&self, filenames: &[&str]) -> FileLockGuard {
        let mut names: Vec<&str> = filenames.to_vec();
        names.sort_unstable();
        names.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.retain(|_, m| Arc::strong_count(m) > 1);
            names
                .iter()
                .map(|name| map.entry((*name).to_string()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        FileLockGuard { _guards: guards }
    }

    /// Number of filenames currently tracked.
    pub fn tracked(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values().filter(|m| Arc::strong_count(m) > 1).count()
    }
}
