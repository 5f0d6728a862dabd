//! Orchestrator behavior against an in-memory store and call-counting fake
//! providers. No network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use coachdb_acquire::{
    AcquireError, AcquireSettings, AcquisitionSource, DrainedJob, MemoryProfileStore,
    Orchestrator, ProfileFilter, ProfileStore, StoreError, NOT_FOUND_MESSAGE,
};
use coachdb_core::{Profile, SnapshotProgress, SnapshotStatus};
use coachdb_scraper::{
    BatchProvider, FetchedProfile, ImageRelocator, ProfileProvider, ScraperError,
};

// ---------------------------------------------------------------------------
// fakes
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Reply {
    Found(FetchedProfile),
    Missing,
    RateLimited,
}

#[derive(Default)]
struct FakeProvider {
    replies: HashMap<String, Reply>,
    calls: AtomicU32,
    batch: Option<FakeBatch>,
}

impl FakeProvider {
    fn with(mut self, username: &str, reply: Reply) -> Self {
        self.replies.insert(username.to_owned(), reply);
        self
    }

    fn with_batch(mut self, batch: FakeBatch) -> Self {
        self.batch = Some(batch);
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_one(&self, username: &str) -> Result<Option<FetchedProfile>, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(username) {
            Some(Reply::Found(fetched)) => Ok(Some(fetched.clone())),
            Some(Reply::RateLimited) => Err(ScraperError::RateLimited {
                provider: "fake",
                retry_after_secs: 60,
            }),
            Some(Reply::Missing) | None => Ok(None),
        }
    }

    fn batch(&self) -> Option<&dyn BatchProvider> {
        self.batch.as_ref().map(|b| b as &dyn BatchProvider)
    }
}

#[derive(Default)]
struct FakeBatch {
    triggered: Mutex<Vec<Vec<String>>>,
    status: Mutex<Option<SnapshotStatus>>,
    results: Vec<Profile>,
    polls: AtomicU32,
    drains: AtomicU32,
}

impl FakeBatch {
    fn ready_with(results: Vec<Profile>) -> Self {
        Self {
            status: Mutex::new(Some(SnapshotStatus::Ready)),
            results,
            ..Self::default()
        }
    }
}

#[async_trait]
impl BatchProvider for FakeBatch {
    async fn trigger_batch(&self, urls: &[String]) -> Result<String, ScraperError> {
        self.triggered.lock().unwrap().push(urls.to_vec());
        Ok("s_test".to_owned())
    }

    async fn poll_status(&self, snapshot_id: &str) -> Result<SnapshotProgress, ScraperError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let status = self.status.lock().unwrap().unwrap_or(SnapshotStatus::Running);
        Ok(SnapshotProgress {
            snapshot_id: snapshot_id.to_owned(),
            status,
            progress: 2,
            total: 2,
        })
    }

    async fn drain_results(&self, _snapshot_id: &str) -> Result<Vec<Profile>, ScraperError> {
        self.drains.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

/// Reads and bookkeeping go to an in-memory store; every profile write fails.
#[derive(Default)]
struct FailingWrites {
    inner: MemoryProfileStore,
}

#[async_trait]
impl ProfileStore for FailingWrites {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StoreError> {
        self.inner.find_by_username(username).await
    }

    async fn find_many_by_username(
        &self,
        usernames: &[String],
    ) -> Result<Vec<Profile>, StoreError> {
        self.inner.find_many_by_username(usernames).await
    }

    async fn upsert_by_username(&self, _profile: &Profile) -> Result<Profile, StoreError> {
        Err(StoreError::Other("connection reset".to_owned()))
    }

    async fn insert_if_absent(&self, _profile: &Profile) -> Result<bool, StoreError> {
        Err(StoreError::Other("connection reset".to_owned()))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_by_id(id).await
    }

    async fn count(&self, filter: &ProfileFilter) -> Result<i64, StoreError> {
        self.inner.count(filter).await
    }

    async fn find_drained_job(&self, job_handle: &str) -> Result<Option<DrainedJob>, StoreError> {
        self.inner.find_drained_job(job_handle).await
    }

    async fn record_drained_job(
        &self,
        job_handle: &str,
        usernames: &[String],
    ) -> Result<(), StoreError> {
        self.inner.record_drained_job(job_handle, usernames).await
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn coach(username: &str) -> Profile {
    let mut profile = Profile::new(format!("id-{username}"), username);
    profile.bio = Some("Fitness Coach aus Berlin".to_owned());
    profile.niche = "Fitness".to_owned();
    profile.followers_count = 1000;
    profile
}

fn fetched(username: &str) -> Reply {
    Reply::Found(FetchedProfile {
        profile: coach(username),
        related: Vec::new(),
    })
}

fn fresh(username: &str) -> Profile {
    let mut profile = coach(username);
    profile.last_fetched = Some(Utc::now() - chrono::Duration::days(1));
    profile
}

fn stub(username: &str) -> Profile {
    let mut profile = Profile::new(format!("id-{username}"), username);
    profile.is_partial = true;
    profile
}

fn settings() -> AcquireSettings {
    AcquireSettings {
        freshness: chrono::Duration::days(30),
        inter_request_delay: Duration::ZERO,
        persist_related: false,
        bulk_result_ttl: Duration::from_secs(60),
    }
}

fn orchestrator(
    store: &Arc<MemoryProfileStore>,
    provider: &Arc<FakeProvider>,
    settings: AcquireSettings,
) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(store) as Arc<dyn ProfileStore>,
        Arc::clone(provider) as Arc<dyn ProfileProvider>,
        ImageRelocator::disabled(),
        settings,
    )
}

fn names(profiles: &[Profile]) -> Vec<&str> {
    profiles.iter().map(|p| p.username.as_str()).collect()
}

// ---------------------------------------------------------------------------
// acquire_one
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_one_fetches_persists_and_then_serves_from_cache() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with("anna", fetched("anna")));
    let orch = orchestrator(&store, &provider, settings());

    let first = orch.acquire_one("Anna").await.unwrap().expect("found");
    assert_eq!(first.source, AcquisitionSource::Provider);
    assert!(first.profile.last_fetched.is_some());
    assert!(!first.profile.is_partial);

    let second = orch.acquire_one("anna").await.unwrap().expect("found");
    assert_eq!(second.source, AcquisitionSource::Cache);
    assert_eq!(second.profile.username, "anna");
    assert_eq!(provider.calls(), 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn stale_record_is_refetched_and_updated_in_place() {
    let store = Arc::new(MemoryProfileStore::new());
    let mut old = coach("anna");
    old.last_fetched = Some(Utc::now() - chrono::Duration::days(45));
    old.followers_count = 10;
    store.seed(old).await;

    let provider = Arc::new(FakeProvider::default().with("anna", fetched("anna")));
    let orch = orchestrator(&store, &provider, settings());

    let result = orch.acquire_one("anna").await.unwrap().expect("found");
    assert_eq!(result.source, AcquisitionSource::Provider);
    assert_eq!(provider.calls(), 1);

    let stored = store.find_by_username("anna").await.unwrap().unwrap();
    assert_eq!(stored.followers_count, 1000);
    assert!(stored.last_fetched.unwrap() > Utc::now() - chrono::Duration::minutes(1));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn partial_record_is_upgraded_by_a_full_fetch() {
    let store = Arc::new(MemoryProfileStore::new());
    store.seed(stub("anna")).await;

    let provider = Arc::new(FakeProvider::default().with("anna", fetched("anna")));
    let orch = orchestrator(&store, &provider, settings());

    let result = orch.acquire_one("anna").await.unwrap().expect("found");
    assert_eq!(result.source, AcquisitionSource::Provider);

    let stored = store.find_by_username("anna").await.unwrap().unwrap();
    assert!(!stored.is_partial);
    assert_eq!(stored.followers_count, 1000);
}

#[tokio::test]
async fn not_found_returns_none_and_writes_nothing() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with("ghost", Reply::Missing));
    let orch = orchestrator(&store, &provider, settings());

    assert!(orch.acquire_one("ghost").await.unwrap().is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn acquire_one_returns_the_profile_when_persisting_fails() {
    let store = Arc::new(FailingWrites::default());
    let provider = Arc::new(FakeProvider::default().with("anna", fetched("anna")));
    let orch = Orchestrator::new(
        Arc::clone(&store) as Arc<dyn ProfileStore>,
        Arc::clone(&provider) as Arc<dyn ProfileProvider>,
        ImageRelocator::disabled(),
        settings(),
    );

    let acquisition = orch.acquire_one("anna").await.unwrap().expect("found");
    assert_eq!(acquisition.source, AcquisitionSource::Provider);
    assert_eq!(acquisition.profile.username, "anna");
    assert!(acquisition.profile.last_fetched.is_some());
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn empty_username_is_invalid_input() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default());
    let orch = orchestrator(&store, &provider, settings());

    let err = orch.acquire_one("  @ ").await.unwrap_err();
    assert!(matches!(err, AcquireError::InvalidInput(_)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn rate_limit_propagates_and_leaves_store_untouched() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with("anna", Reply::RateLimited));
    let orch = orchestrator(&store, &provider, settings());

    let err = orch.acquire_one("anna").await.unwrap_err();
    assert!(matches!(err, AcquireError::RateLimited { .. }));
    assert_eq!(provider.calls(), 1);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn related_accounts_are_returned_and_optionally_persisted() {
    let with_related = Reply::Found(FetchedProfile {
        profile: coach("anna"),
        related: vec![stub("ben"), stub("anna"), stub("ben")],
    });

    // not persisted by default
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with("anna", with_related.clone()));
    let orch = orchestrator(&store, &provider, settings());
    let result = orch.acquire_one("anna").await.unwrap().unwrap();
    assert_eq!(names(&result.related), vec!["ben"]);
    assert_eq!(store.len().await, 1);

    // persisted as stubs without overwriting existing rows
    let store = Arc::new(MemoryProfileStore::new());
    store.seed(fresh("ben")).await;
    let mut persisting = settings();
    persisting.persist_related = true;
    let provider = Arc::new(FakeProvider::default().with("anna", with_related));
    let orch = orchestrator(&store, &provider, persisting);
    orch.acquire_one("anna").await.unwrap().unwrap();

    let ben = store.find_by_username("ben").await.unwrap().unwrap();
    assert!(!ben.is_partial, "existing full record must not be overwritten");
    assert_eq!(store.len().await, 2);
}

// ---------------------------------------------------------------------------
// acquire_many
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_many_mixes_cache_hits_fetches_and_failures() {
    let store = Arc::new(MemoryProfileStore::new());
    store.seed(fresh("anna")).await;

    let provider = Arc::new(
        FakeProvider::default()
            .with("ben", fetched("ben"))
            .with("ghost", Reply::Missing)
            .with("busy", Reply::RateLimited),
    );
    let orch = orchestrator(&store, &provider, settings());

    let input = ["anna", "ben", "ghost", "busy"].map(str::to_owned);
    let outcome = orch.acquire_many(&input).await;

    assert_eq!(names(&outcome.succeeded), vec!["anna", "ben"]);
    assert_eq!(outcome.failed.len(), 2);
    assert_eq!(outcome.failed[0].username, "ghost");
    assert_eq!(outcome.failed[0].error, NOT_FOUND_MESSAGE);
    assert_eq!(outcome.failed[1].username, "busy");
    assert!(outcome.failed[1].error.contains("rate limited"));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn acquire_many_processes_case_variants_once() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with("anna", fetched("anna")));
    let orch = orchestrator(&store, &provider, settings());

    let input = ["Anna", "anna", "@ANNA"].map(str::to_owned);
    let outcome = orch.acquire_many(&input).await;

    assert_eq!(names(&outcome.succeeded), vec!["anna"]);
    assert!(outcome.failed.is_empty());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn acquire_many_dedups_related_against_all_primaries() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(
        FakeProvider::default()
            .with(
                "anna",
                Reply::Found(FetchedProfile {
                    profile: coach("anna"),
                    related: vec![stub("ben"), stub("carla")],
                }),
            )
            .with(
                "ben",
                Reply::Found(FetchedProfile {
                    profile: coach("ben"),
                    related: vec![stub("carla"), stub("dora")],
                }),
            ),
    );
    let orch = orchestrator(&store, &provider, settings());

    let input = ["anna", "ben"].map(str::to_owned);
    let outcome = orch.acquire_many(&input).await;

    assert_eq!(names(&outcome.succeeded), vec!["anna", "ben"]);
    assert_eq!(names(&outcome.related), vec!["carla", "dora"]);
}

#[tokio::test]
async fn acquire_many_waits_between_provider_calls_only() {
    let store = Arc::new(MemoryProfileStore::new());
    store.seed(fresh("cached1")).await;
    store.seed(fresh("cached2")).await;
    let provider = Arc::new(
        FakeProvider::default()
            .with("ben", fetched("ben"))
            .with("carla", fetched("carla")),
    );
    let mut delayed = settings();
    delayed.inter_request_delay = Duration::from_millis(60);
    let orch = orchestrator(&store, &provider, delayed);

    let started = std::time::Instant::now();
    let input = ["cached1", "ben", "cached2", "carla"].map(str::to_owned);
    let outcome = orch.acquire_many(&input).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome.succeeded.len(), 4);
    assert_eq!(provider.calls(), 2);
    // one delay: before the second provider call only
    assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(120), "elapsed {elapsed:?}");
}

// ---------------------------------------------------------------------------
// bulk
// ---------------------------------------------------------------------------

fn url(username: &str) -> String {
    format!("https://www.instagram.com/{username}/")
}

#[tokio::test]
async fn trigger_bulk_requires_batch_capability() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default());
    let orch = orchestrator(&store, &provider, settings());

    let err = orch.trigger_bulk(&[url("anna")]).await.unwrap_err();
    assert!(matches!(err, AcquireError::BatchUnsupported("fake")));
}

#[tokio::test]
async fn trigger_bulk_rejects_empty_input() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with_batch(FakeBatch::default()));
    let orch = orchestrator(&store, &provider, settings());

    let err = orch.trigger_bulk(&["  ".to_owned()]).await.unwrap_err();
    assert!(matches!(err, AcquireError::InvalidInput(_)));
}

#[tokio::test]
async fn trigger_bulk_submits_only_uncached_urls() {
    let store = Arc::new(MemoryProfileStore::new());
    for name in ["a1", "a2", "a3"] {
        store.seed(fresh(name)).await;
    }
    let provider = Arc::new(FakeProvider::default().with_batch(FakeBatch::default()));
    let orch = orchestrator(&store, &provider, settings());

    let input: Vec<String> = ["a1", "b1", "a2", "b2", "a3"].iter().map(|n| url(n)).collect();
    let trigger = orch.trigger_bulk(&input).await.unwrap();

    assert_eq!(trigger.job_handle.as_deref(), Some("s_test"));
    assert_eq!(names(&trigger.already_cached), vec!["a1", "a2", "a3"]);
    assert_eq!(trigger.submitted, vec![url("b1"), url("b2")]);

    let batch = provider.batch.as_ref().unwrap();
    assert_eq!(*batch.triggered.lock().unwrap(), vec![vec![url("b1"), url("b2")]]);
}

#[tokio::test]
async fn trigger_bulk_with_everything_cached_starts_no_job() {
    let store = Arc::new(MemoryProfileStore::new());
    store.seed(fresh("a1")).await;
    let provider = Arc::new(FakeProvider::default().with_batch(FakeBatch::default()));
    let orch = orchestrator(&store, &provider, settings());

    let trigger = orch.trigger_bulk(&[url("a1"), url("A1")]).await.unwrap();

    assert!(trigger.job_handle.is_none());
    assert!(trigger.submitted.is_empty());
    assert_eq!(trigger.already_cached.len(), 1);
    assert!(provider.batch.as_ref().unwrap().triggered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn trigger_bulk_submits_urls_without_a_username_as_is() {
    let store = Arc::new(MemoryProfileStore::new());
    let provider = Arc::new(FakeProvider::default().with_batch(FakeBatch::default()));
    let orch = orchestrator(&store, &provider, settings());

    let odd = "https://www.instagram.com/p/Cxyz/".to_owned();
    let trigger = orch.trigger_bulk(&[odd.clone()]).await.unwrap();
    assert_eq!(trigger.submitted, vec![odd]);
}

#[tokio::test]
async fn poll_bulk_reports_running_without_draining() {
    let store = Arc::new(MemoryProfileStore::new());
    let batch = FakeBatch {
        status: Mutex::new(Some(SnapshotStatus::Running)),
        ..FakeBatch::default()
    };
    let provider = Arc::new(FakeProvider::default().with_batch(batch));
    let orch = orchestrator(&store, &provider, settings());

    let poll = orch.poll_bulk("s_test").await.unwrap();
    assert_eq!(poll.status, SnapshotStatus::Running);
    assert!(poll.profiles.is_none());
    assert_eq!(provider.batch.as_ref().unwrap().drains.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn poll_bulk_drains_persists_and_is_idempotent() {
    let store = Arc::new(MemoryProfileStore::new());
    let batch = FakeBatch::ready_with(vec![coach("b1"), coach("b2"), coach("B1")]);
    let provider = Arc::new(FakeProvider::default().with_batch(batch));
    let orch = orchestrator(&store, &provider, settings());

    let first = orch.poll_bulk("s_test").await.unwrap();
    assert_eq!(first.status, SnapshotStatus::Ready);
    let profiles = first.profiles.clone().expect("drained");
    assert_eq!(names(&profiles), vec!["b1", "b2"]);
    assert!(profiles.iter().all(|p| p.last_fetched.is_some()));
    assert_eq!(store.len().await, 2);

    let second = orch.poll_bulk("s_test").await.unwrap();
    assert_eq!(second.profiles, first.profiles);

    let batch = provider.batch.as_ref().unwrap();
    assert_eq!(batch.polls.load(Ordering::SeqCst), 1);
    assert_eq!(batch.drains.load(Ordering::SeqCst), 1);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn poll_bulk_reports_failed_job_without_profiles() {
    let store = Arc::new(MemoryProfileStore::new());
    let batch = FakeBatch {
        status: Mutex::new(Some(SnapshotStatus::Failed)),
        ..FakeBatch::default()
    };
    let provider = Arc::new(FakeProvider::default().with_batch(batch));
    let orch = orchestrator(&store, &provider, settings());

    let poll = orch.poll_bulk("s_test").await.unwrap();
    assert_eq!(poll.status, SnapshotStatus::Failed);
    assert!(poll.profiles.is_none());
}

#[tokio::test]
async fn poll_bulk_drains_once_across_orchestrators_sharing_a_store() {
    let store = Arc::new(MemoryProfileStore::new());
    let batch = FakeBatch::ready_with(vec![coach("b1"), coach("b2")]);
    let provider = Arc::new(FakeProvider::default().with_batch(batch));

    let first = orchestrator(&store, &provider, settings())
        .poll_bulk("s_test")
        .await
        .unwrap();
    let second = orchestrator(&store, &provider, settings())
        .poll_bulk("s_test")
        .await
        .unwrap();

    assert_eq!(second.status, SnapshotStatus::Ready);
    assert_eq!(second.profiles, first.profiles);
    assert_eq!(second.progress, 2);
    assert_eq!(second.total, 2);

    let batch = provider.batch.as_ref().unwrap();
    assert_eq!(batch.polls.load(Ordering::SeqCst), 1);
    assert_eq!(batch.drains.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn poll_bulk_drains_once_after_the_result_ttl_lapses() {
    let store = Arc::new(MemoryProfileStore::new());
    let batch = FakeBatch::ready_with(vec![coach("b1"), coach("b2")]);
    let provider = Arc::new(FakeProvider::default().with_batch(batch));
    let orch = orchestrator(
        &store,
        &provider,
        AcquireSettings {
            bulk_result_ttl: Duration::ZERO,
            ..settings()
        },
    );

    let first = orch.poll_bulk("s_test").await.unwrap();
    let second = orch.poll_bulk("s_test").await.unwrap();

    assert_eq!(second.profiles, first.profiles);
    let batch = provider.batch.as_ref().unwrap();
    assert_eq!(batch.drains.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn poll_bulk_returns_drained_profiles_when_persisting_fails() {
    let store = Arc::new(FailingWrites::default());
    let batch = FakeBatch::ready_with(vec![coach("b1"), coach("b2")]);
    let provider = Arc::new(FakeProvider::default().with_batch(batch));
    let orch = Orchestrator::new(
        Arc::clone(&store) as Arc<dyn ProfileStore>,
        Arc::clone(&provider) as Arc<dyn ProfileProvider>,
        ImageRelocator::disabled(),
        settings(),
    );

    let poll = orch.poll_bulk("s_test").await.unwrap();
    assert_eq!(poll.status, SnapshotStatus::Ready);
    let profiles = poll.profiles.expect("drained");
    assert_eq!(names(&profiles), vec!["b1", "b2"]);
    assert!(profiles.iter().all(|p| p.last_fetched.is_some()));
    assert!(store.inner.is_empty().await);
}
