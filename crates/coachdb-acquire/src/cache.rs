//! Freshness-aware read path over the profile store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use coachdb_core::{normalize_username, Profile};

use crate::store::ProfileStore;

/// Why a lookup did not produce a usable cached profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    NotFound,
    /// A related-account stub exists for this username.
    Partial(Profile),
    /// A full record exists but is older than the freshness window, or was
    /// never stamped.
    Stale(Profile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Profile),
    Miss(MissReason),
}

impl CacheLookup {
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Decides whether a username can be served from the store.
///
/// Read-only: never writes and never calls a provider.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn ProfileStore>,
    freshness: Duration,
}

impl CacheGateway {
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, freshness: Duration) -> Self {
        Self { store, freshness }
    }

    #[must_use]
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Classifies a stored record against the freshness window at `now`.
    #[must_use]
    pub fn evaluate(&self, profile: Profile, now: DateTime<Utc>) -> CacheLookup {
        if profile.is_partial {
            return CacheLookup::Miss(MissReason::Partial(profile));
        }
        match profile.last_fetched {
            Some(fetched) if now.signed_duration_since(fetched) <= self.freshness => {
                CacheLookup::Hit(profile)
            }
            _ => CacheLookup::Miss(MissReason::Stale(profile)),
        }
    }

    /// Looks up one username. A store read failure is logged and reported as
    /// a miss so acquisition can proceed.
    pub async fn lookup(&self, username: &str) -> CacheLookup {
        let key = normalize_username(username);
        match self.store.find_by_username(&key).await {
            Ok(Some(profile)) => self.evaluate(profile, Utc::now()),
            Ok(None) => CacheLookup::Miss(MissReason::NotFound),
            Err(e) => {
                tracing::warn!(username = %key, error = %e, "cache read failed, treating as miss");
                CacheLookup::Miss(MissReason::NotFound)
            }
        }
    }

    /// Splits `usernames` into fresh hits and the usernames that need a
    /// provider call, using one batch read. Misses keep input order and are
    /// normalized and deduplicated.
    pub async fn lookup_many(&self, usernames: &[String]) -> (Vec<Profile>, Vec<String>) {
        let mut keys: Vec<String> = Vec::with_capacity(usernames.len());
        for username in usernames {
            let key = normalize_username(username);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let stored = match self.store.find_many_by_username(&keys).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, count = keys.len(), "batch cache read failed, treating all as misses");
                Vec::new()
            }
        };

        let now = Utc::now();
        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for key in keys {
            let found = stored
                .iter()
                .find(|p| normalize_username(&p.username) == key)
                .cloned();
            match found.map(|p| self.evaluate(p, now)) {
                Some(CacheLookup::Hit(profile)) => hits.push(profile),
                _ => misses.push(key),
            }
        }
        (hits, misses)
    }
}
