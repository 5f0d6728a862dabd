//! Cache-first acquisition of profiles: single, sequential multi, and
//! provider batch jobs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coachdb_core::{normalize_username, AppConfig, Profile, SnapshotStatus};
use coachdb_scraper::{username_from_profile_url, BatchProvider, ImageRelocator, ProfileProvider};
use serde::Serialize;

use crate::bulk::BulkResultCache;
use crate::cache::{CacheGateway, CacheLookup, MissReason};
use crate::dedup::ProfileSet;
use crate::error::AcquireError;
use crate::store::ProfileStore;

/// Failure message recorded for usernames that yield no profile.
pub const NOT_FOUND_MESSAGE: &str = "profile not found or not in scope";

#[derive(Debug, Clone)]
pub struct AcquireSettings {
    /// Maximum age of a cached profile that still counts as fresh.
    pub freshness: chrono::Duration,
    /// Pause before every provider call after the first in a multi-acquire.
    pub inter_request_delay: Duration,
    /// Whether related-account stubs are written to the store.
    pub persist_related: bool,
    /// How long a drained batch result set is remembered.
    pub bulk_result_ttl: Duration,
}

impl AcquireSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            freshness: chrono::Duration::days(i64::from(config.freshness_days)),
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
            persist_related: config.persist_related,
            bulk_result_ttl: Duration::from_secs(config.bulk_result_ttl_secs),
        }
    }
}

impl Default for AcquireSettings {
    fn default() -> Self {
        Self {
            freshness: chrono::Duration::days(30),
            inter_request_delay: Duration::from_millis(1_000),
            persist_related: false,
            bulk_result_ttl: Duration::from_secs(3_600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionSource {
    Cache,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acquisition {
    pub profile: Profile,
    /// Related-account stubs discovered with a fresh fetch; always empty for
    /// cache hits.
    pub related: Vec<Profile>,
    pub source: AcquisitionSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAcquisition {
    pub username: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub succeeded: Vec<Profile>,
    pub related: Vec<Profile>,
    pub failed: Vec<FailedAcquisition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTrigger {
    /// `None` when every input was served from the cache.
    pub job_handle: Option<String>,
    pub already_cached: Vec<Profile>,
    /// URLs sent to the provider.
    pub submitted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPoll {
    pub status: SnapshotStatus,
    pub progress: u64,
    pub total: u64,
    /// Present once the job is ready and drained.
    pub profiles: Option<Vec<Profile>>,
}

/// Coordinates the cache, the provider, picture relocation and persistence.
pub struct Orchestrator {
    cache: CacheGateway,
    store: Arc<dyn ProfileStore>,
    provider: Arc<dyn ProfileProvider>,
    relocator: ImageRelocator,
    settings: AcquireSettings,
    bulk_results: BulkResultCache,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ProfileStore>,
        provider: Arc<dyn ProfileProvider>,
        relocator: ImageRelocator,
        settings: AcquireSettings,
    ) -> Self {
        Self {
            cache: CacheGateway::new(Arc::clone(&store), settings.freshness),
            bulk_results: BulkResultCache::new(settings.bulk_result_ttl),
            store,
            provider,
            relocator,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AcquireSettings {
        &self.settings
    }

    /// Returns the profile for `username`, from the cache when fresh,
    /// otherwise from the provider (then persisted).
    ///
    /// `Ok(None)` when the account does not exist, is private, or is out of
    /// scope.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::InvalidInput`] for an empty username.
    /// - [`AcquireError::RateLimited`], [`AcquireError::Malformed`] or
    ///   [`AcquireError::Provider`] when the provider call fails.
    pub async fn acquire_one(&self, username: &str) -> Result<Option<Acquisition>, AcquireError> {
        let key = normalize_username(username);
        if key.is_empty() {
            return Err(AcquireError::InvalidInput(
                "username must not be empty".to_owned(),
            ));
        }

        match self.cache.lookup(&key).await {
            CacheLookup::Hit(profile) => {
                tracing::info!(username = %key, "cache hit");
                Ok(Some(Acquisition {
                    profile,
                    related: Vec::new(),
                    source: AcquisitionSource::Cache,
                }))
            }
            CacheLookup::Miss(reason) => {
                tracing::debug!(username = %key, reason = reason_label(&reason), "cache miss");
                self.fetch_fresh(&key).await
            }
        }
    }

    /// Acquires each username in order, one provider call at a time.
    ///
    /// Never fails as a whole: per-username errors are collected in
    /// [`BatchOutcome::failed`]. Repeated usernames are processed once.
    pub async fn acquire_many(&self, usernames: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut primaries = ProfileSet::new();
        let mut related_candidates: Vec<Profile> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut provider_calls = 0u32;

        for raw in usernames {
            let key = normalize_username(raw);
            if key.is_empty() {
                outcome.failed.push(FailedAcquisition {
                    username: raw.clone(),
                    error: "username must not be empty".to_owned(),
                });
                continue;
            }
            if !seen.insert(key.clone()) {
                continue;
            }

            let result = match self.cache.lookup(&key).await {
                CacheLookup::Hit(profile) => {
                    tracing::info!(username = %key, "cache hit");
                    Ok(Some(Acquisition {
                        profile,
                        related: Vec::new(),
                        source: AcquisitionSource::Cache,
                    }))
                }
                CacheLookup::Miss(_) => {
                    if provider_calls > 0 && !self.settings.inter_request_delay.is_zero() {
                        tokio::time::sleep(self.settings.inter_request_delay).await;
                    }
                    provider_calls += 1;
                    self.fetch_fresh(&key).await
                }
            };

            match result {
                Ok(Some(acquisition)) => {
                    primaries.insert(acquisition.profile);
                    related_candidates.extend(acquisition.related);
                }
                Ok(None) => outcome.failed.push(FailedAcquisition {
                    username: key,
                    error: NOT_FOUND_MESSAGE.to_owned(),
                }),
                Err(e) => {
                    tracing::warn!(username = %key, error = %e, "acquisition failed");
                    outcome.failed.push(FailedAcquisition {
                        username: key,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut related = ProfileSet::new();
        for profile in primaries.iter() {
            related.reserve(&profile.username);
        }
        for candidate in related_candidates {
            related.insert(candidate);
        }

        outcome.succeeded = primaries.into_vec();
        outcome.related = related.into_vec();
        tracing::info!(
            requested = usernames.len(),
            succeeded = outcome.succeeded.len(),
            related = outcome.related.len(),
            failed = outcome.failed.len(),
            provider_calls,
            "multi acquisition finished"
        );
        outcome
    }

    /// Starts a provider batch job for the profile URLs that are not freshly
    /// cached.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::BatchUnsupported`] if the provider has no batch
    ///   capability.
    /// - [`AcquireError::InvalidInput`] if no non-empty URL is given.
    /// - Provider errors from the trigger call.
    pub async fn trigger_bulk(&self, urls: &[String]) -> Result<BulkTrigger, AcquireError> {
        let batch = self.batch()?;

        let mut inputs: Vec<(Option<String>, String)> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            if !seen_urls.insert(url.to_owned()) {
                continue;
            }
            let username = username_from_profile_url(url);
            if let Some(name) = &username {
                if !seen_names.insert(name.clone()) {
                    continue;
                }
            }
            inputs.push((username, url.to_owned()));
        }
        if inputs.is_empty() {
            return Err(AcquireError::InvalidInput(
                "at least one profile URL is required".to_owned(),
            ));
        }

        let usernames: Vec<String> = inputs.iter().filter_map(|(name, _)| name.clone()).collect();
        let (already_cached, _) = self.cache.lookup_many(&usernames).await;
        let cached: HashSet<&str> = already_cached.iter().map(|p| p.username.as_str()).collect();

        let submitted: Vec<String> = inputs
            .into_iter()
            .filter(|(name, _)| name.as_deref().is_none_or(|n| !cached.contains(n)))
            .map(|(_, url)| url)
            .collect();

        if submitted.is_empty() {
            tracing::info!(cached = already_cached.len(), "all bulk inputs are cached, no job started");
            return Ok(BulkTrigger {
                job_handle: None,
                already_cached,
                submitted,
            });
        }

        let handle = batch.trigger_batch(&submitted).await?;
        tracing::info!(
            job_handle = %handle,
            submitted = submitted.len(),
            cached = already_cached.len(),
            "bulk job started"
        );
        Ok(BulkTrigger {
            job_handle: Some(handle),
            already_cached,
            submitted,
        })
    }

    /// Reports a batch job's progress; once ready, drains, persists and
    /// returns its profiles.
    ///
    /// A job is drained at most once per store: later polls are answered from
    /// the in-memory result cache, or from the recorded drain and the stored
    /// profiles, without contacting the provider or writing again.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::InvalidInput`] for an empty handle.
    /// - [`AcquireError::BatchUnsupported`] if the provider has no batch
    ///   capability.
    /// - Provider errors from the poll or drain calls, including
    ///   [`AcquireError::Malformed`] for a non-array result payload.
    pub async fn poll_bulk(&self, handle: &str) -> Result<BulkPoll, AcquireError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(AcquireError::InvalidInput(
                "job handle must not be empty".to_owned(),
            ));
        }

        if let Some(profiles) = self.bulk_results.get(handle) {
            tracing::debug!(job_handle = handle, "serving drained bulk result from memory");
            return Ok(drained_poll(profiles));
        }
        if let Some(profiles) = self.previously_drained(handle).await {
            tracing::debug!(job_handle = handle, "serving drained bulk result from the store");
            self.bulk_results.insert(handle, profiles.clone());
            return Ok(drained_poll(profiles));
        }

        let batch = self.batch()?;
        let progress = batch.poll_status(handle).await?;
        if progress.status != SnapshotStatus::Ready {
            if progress.status == SnapshotStatus::Failed {
                tracing::warn!(job_handle = handle, "bulk job failed");
            }
            return Ok(BulkPoll {
                status: progress.status,
                progress: progress.progress,
                total: progress.total,
                profiles: None,
            });
        }

        let drained = batch.drain_results(handle).await?;
        let mut persisted = ProfileSet::new();
        for profile in drained {
            if persisted.contains(&profile.username) {
                continue;
            }
            persisted.insert(self.persist_fresh(profile).await);
        }
        let profiles = persisted.into_vec();
        let usernames: Vec<String> = profiles.iter().map(|p| p.username.clone()).collect();
        if let Err(e) = self.store.record_drained_job(handle, &usernames).await {
            tracing::error!(job_handle = handle, error = %e, "failed to record drained bulk job");
        }
        self.bulk_results.insert(handle, profiles.clone());

        tracing::info!(job_handle = handle, profiles = profiles.len(), "bulk job drained");
        Ok(BulkPoll {
            status: SnapshotStatus::Ready,
            progress: progress.progress,
            total: progress.total,
            profiles: Some(profiles),
        })
    }

    // ---- internals ----

    fn batch(&self) -> Result<&dyn BatchProvider, AcquireError> {
        self.provider
            .batch()
            .ok_or_else(|| AcquireError::BatchUnsupported(self.provider.name()))
    }

    async fn fetch_fresh(&self, username: &str) -> Result<Option<Acquisition>, AcquireError> {
        let Some(fetched) = self.provider.fetch_one(username).await? else {
            tracing::info!(username, provider = self.provider.name(), "no profile returned");
            return Ok(None);
        };

        let profile = self.persist_fresh(fetched.profile).await;

        let mut related = ProfileSet::new();
        related.reserve(username);
        related.reserve(&profile.username);
        for candidate in fetched.related {
            related.insert(candidate);
        }
        let related = related.into_vec();
        if self.settings.persist_related {
            self.persist_related(&related).await;
        }

        tracing::info!(
            username = %profile.username,
            niche = %profile.niche,
            related = related.len(),
            "profile acquired from provider"
        );
        Ok(Some(Acquisition {
            profile,
            related,
            source: AcquisitionSource::Provider,
        }))
    }

    /// Relocates the picture, stamps the profile as a full fetch and upserts
    /// it. A failed write is logged and the unsaved profile is returned.
    async fn persist_fresh(&self, mut profile: Profile) -> Profile {
        self.relocator.relocate_profile(&mut profile).await;
        profile.last_fetched = Some(Utc::now());
        profile.is_partial = false;

        match self.store.upsert_by_username(&profile).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(username = %profile.username, error = %e, "failed to persist profile");
                profile
            }
        }
    }

    /// Rebuilds the result set of a job drained earlier, possibly by another
    /// process. A store failure is logged and treated as "not drained".
    async fn previously_drained(&self, handle: &str) -> Option<Vec<Profile>> {
        let job = match self.store.find_drained_job(handle).await {
            Ok(job) => job?,
            Err(e) => {
                tracing::warn!(job_handle = handle, error = %e, "drained job lookup failed");
                return None;
            }
        };
        let found = match self.store.find_many_by_username(&job.usernames).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(job_handle = handle, error = %e, "drained profiles lookup failed");
                return None;
            }
        };

        let mut by_name: HashMap<String, Profile> =
            found.into_iter().map(|p| (p.username.clone(), p)).collect();
        Some(
            job.usernames
                .iter()
                .filter_map(|name| by_name.remove(name))
                .collect(),
        )
    }

    async fn persist_related(&self, related: &[Profile]) {
        for stub in related {
            match self.store.insert_if_absent(stub).await {
                Ok(true) => tracing::debug!(username = %stub.username, "related account stored"),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(username = %stub.username, error = %e, "failed to store related account");
                }
            }
        }
    }
}

fn drained_poll(profiles: Vec<Profile>) -> BulkPoll {
    let count = profiles.len() as u64;
    BulkPoll {
        status: SnapshotStatus::Ready,
        progress: count,
        total: count,
        profiles: Some(profiles),
    }
}

fn reason_label(reason: &MissReason) -> &'static str {
    match reason {
        MissReason::NotFound => "not_found",
        MissReason::Partial(_) => "partial",
        MissReason::Stale(_) => "stale",
    }
}
