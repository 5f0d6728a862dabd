//! Persistence seam for the acquisition pipeline.
//!
//! [`PgProfileStore`] is the production store; [`MemoryProfileStore`] backs
//! tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachdb_core::{normalize_username, Profile};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Filter for [`ProfileStore::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFilter {
    pub niche: Option<String>,
    pub include_partial: bool,
}

/// A batch job whose results were already drained and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedJob {
    pub job_handle: String,
    /// Usernames of the persisted profiles, in drain order.
    pub usernames: Vec<String>,
    pub drained_at: DateTime<Utc>,
}

/// Profile persistence keyed by lowercase username.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StoreError>;

    /// Batch lookup; unknown usernames are simply absent from the result.
    async fn find_many_by_username(&self, usernames: &[String])
        -> Result<Vec<Profile>, StoreError>;

    /// Inserts or updates by username. Never creates a second record for a
    /// username that already exists. A record holding the same id under
    /// another username is renamed rather than duplicated.
    async fn upsert_by_username(&self, profile: &Profile) -> Result<Profile, StoreError>;

    /// Inserts only when no record with this username exists. Returns whether
    /// a row was written.
    async fn insert_if_absent(&self, profile: &Profile) -> Result<bool, StoreError>;

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;

    async fn count(&self, filter: &ProfileFilter) -> Result<i64, StoreError>;

    async fn find_drained_job(&self, job_handle: &str) -> Result<Option<DrainedJob>, StoreError>;

    /// Marks `job_handle` as drained. The first record for a handle wins.
    async fn record_drained_job(
        &self,
        job_handle: &str,
        usernames: &[String],
    ) -> Result<(), StoreError>;
}

// ---- Postgres ----

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StoreError> {
        let row =
            coachdb_db::find_profile_by_username(&self.pool, &normalize_username(username)).await?;
        Ok(row.map(Profile::from))
    }

    async fn find_many_by_username(
        &self,
        usernames: &[String],
    ) -> Result<Vec<Profile>, StoreError> {
        let keys: Vec<String> = usernames.iter().map(|u| normalize_username(u)).collect();
        let rows = coachdb_db::find_profiles_by_usernames(&self.pool, &keys).await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn upsert_by_username(&self, profile: &Profile) -> Result<Profile, StoreError> {
        let row = coachdb_db::upsert_profile(&self.pool, profile).await?;
        Ok(row.into())
    }

    async fn insert_if_absent(&self, profile: &Profile) -> Result<bool, StoreError> {
        Ok(coachdb_db::insert_profile_if_absent(&self.pool, profile).await?)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(coachdb_db::delete_profile(&self.pool, id).await?)
    }

    async fn count(&self, filter: &ProfileFilter) -> Result<i64, StoreError> {
        let count =
            coachdb_db::count_profiles(&self.pool, filter.niche.as_deref(), filter.include_partial)
                .await?;
        Ok(count)
    }

    async fn find_drained_job(&self, job_handle: &str) -> Result<Option<DrainedJob>, StoreError> {
        let row = coachdb_db::find_bulk_job(&self.pool, job_handle).await?;
        Ok(row.map(|row| DrainedJob {
            job_handle: row.snapshot_id,
            usernames: row.usernames,
            drained_at: row.drained_at,
        }))
    }

    async fn record_drained_job(
        &self,
        job_handle: &str,
        usernames: &[String],
    ) -> Result<(), StoreError> {
        coachdb_db::record_bulk_job(&self.pool, job_handle, usernames).await?;
        Ok(())
    }
}

// ---- in-memory ----

/// Process-local store with the same username semantics as the table.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
    drained_jobs: RwLock<HashMap<String, DrainedJob>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store, replacing any record with the same username.
    pub async fn seed(&self, profile: Profile) {
        let key = normalize_username(&profile.username);
        self.profiles.write().await.insert(key, profile);
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StoreError> {
        let key = normalize_username(username);
        Ok(self.profiles.read().await.get(&key).cloned())
    }

    async fn find_many_by_username(
        &self,
        usernames: &[String],
    ) -> Result<Vec<Profile>, StoreError> {
        let profiles = self.profiles.read().await;
        let mut found: Vec<Profile> = Vec::new();
        for username in usernames {
            let key = normalize_username(username);
            if found.iter().any(|p| p.username == key) {
                continue;
            }
            if let Some(profile) = profiles.get(&key) {
                found.push(profile.clone());
            }
        }
        Ok(found)
    }

    async fn upsert_by_username(&self, profile: &Profile) -> Result<Profile, StoreError> {
        let key = normalize_username(&profile.username);
        let mut stored = profile.clone();
        stored.username.clone_from(&key);

        let mut profiles = self.profiles.write().await;
        if let Some(existing) = profiles.get(&key) {
            // the row keeps its original id
            stored.id.clone_from(&existing.id);
        } else {
            // ids are unique: an account seen under an old username is renamed
            profiles.retain(|_, p| p.id != stored.id);
        }
        profiles.insert(key, stored.clone());
        Ok(stored)
    }

    async fn insert_if_absent(&self, profile: &Profile) -> Result<bool, StoreError> {
        let key = normalize_username(&profile.username);
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&key) || profiles.values().any(|p| p.id == profile.id) {
            return Ok(false);
        }
        let mut stored = profile.clone();
        stored.username.clone_from(&key);
        profiles.insert(key, stored);
        Ok(true)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let mut profiles = self.profiles.write().await;
        let before = profiles.len();
        profiles.retain(|_, p| p.id != id);
        Ok(profiles.len() < before)
    }

    async fn count(&self, filter: &ProfileFilter) -> Result<i64, StoreError> {
        let profiles = self.profiles.read().await;
        let count = profiles
            .values()
            .filter(|p| filter.include_partial || !p.is_partial)
            .filter(|p| filter.niche.as_deref().is_none_or(|n| p.niche == n))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn find_drained_job(&self, job_handle: &str) -> Result<Option<DrainedJob>, StoreError> {
        Ok(self.drained_jobs.read().await.get(job_handle).cloned())
    }

    async fn record_drained_job(
        &self,
        job_handle: &str,
        usernames: &[String],
    ) -> Result<(), StoreError> {
        self.drained_jobs
            .write()
            .await
            .entry(job_handle.to_owned())
            .or_insert_with(|| DrainedJob {
                job_handle: job_handle.to_owned(),
                usernames: usernames.to_vec(),
                drained_at: Utc::now(),
            });
        Ok(())
    }
}
