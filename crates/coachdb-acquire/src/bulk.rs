//! Short-lived memory of drained batch jobs, so repeated polls of a finished
//! job are answered without the network or the store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use coachdb_core::Profile;

struct Entry {
    drained_at: Instant,
    profiles: Vec<Profile>,
}

/// TTL cache from job handle to its drained profile set.
///
/// The lock is never held across an `.await`.
pub struct BulkResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl BulkResultCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the drained set for `handle` if it is still within the TTL.
    /// Expired entries are evicted on the way.
    pub fn get(&self, handle: &str) -> Option<Vec<Profile>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.drained_at.elapsed() < ttl);
        entries.get(handle).map(|entry| entry.profiles.clone())
    }

    /// Stores the drained set for `handle`, evicting expired entries first.
    pub fn insert(&self, handle: &str, profiles: Vec<Profile>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.drained_at.elapsed() < ttl);
        entries.insert(
            handle.to_owned(),
            Entry {
                drained_at: Instant::now(),
                profiles,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
