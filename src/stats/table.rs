//! Cumulative response bytes per request path.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Process-wide `path → bytes` table behind a single lock.
#[derive(Debug, Default)]
pub struct StatsTable {
    request_bytes: Mutex<HashMap<String, u64>>,
}

/// Point-in-time copy of a `StatsTable`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub request_bytes: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    pub fn get(&self, path: &str) -> Option<u64> {
        self.request_bytes.get(path).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.request_bytes.is_empty()
    }
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a single map operation, so a panic elsewhere
    // cannot leave an entry half-written; recover from poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.request_bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `bytes` to `path`'s total and return the new total.
    pub fn update(&self, path: &str, bytes: u64) -> u64 {
        let mut table = self.lock();
        match table.get_mut(path) {
            Some(total) => {
                *total = total.saturating_add(bytes);
                *total
            }
            None => {
                table.insert(path.to_owned(), bytes);
                bytes
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<u64> {
        self.lock().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy every entry under the lock.
    pub fn snapshot(&self) -> StatsSnapshot {
        let table = self.lock();
        StatsSnapshot {
            request_bytes: table.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}
