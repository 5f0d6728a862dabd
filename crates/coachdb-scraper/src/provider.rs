//! Provider capability traits.
//!
//! Every provider can fetch a single profile synchronously. Providers that
//! also run asynchronous batch jobs expose them through
//! [`ProfileProvider::batch`].

use async_trait::async_trait;
use coachdb_core::{Profile, SnapshotProgress};

use crate::error::ScraperError;

/// A normalized, in-scope profile plus its related-account stubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedProfile {
    pub profile: Profile,
    pub related: Vec<Profile>,
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetches one profile by username.
    ///
    /// Returns `Ok(None)` when the account does not exist, is private, or is
    /// out of scope.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RateLimited`] on HTTP 429, and
    /// [`ScraperError`] for transport, provider, or payload failures.
    async fn fetch_one(&self, username: &str) -> Result<Option<FetchedProfile>, ScraperError>;

    /// Batch capability, if this provider has one.
    fn batch(&self) -> Option<&dyn BatchProvider> {
        None
    }
}

#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Starts a batch job for the given profile URLs and returns its handle.
    async fn trigger_batch(&self, urls: &[String]) -> Result<String, ScraperError>;

    /// Reads the job's progress. Has no side effects on the job.
    async fn poll_status(&self, snapshot_id: &str) -> Result<SnapshotProgress, ScraperError>;

    /// Downloads a finished job's records as normalized, in-scope profiles.
    /// Records that fail normalization or screening are dropped.
    async fn drain_results(&self, snapshot_id: &str) -> Result<Vec<Profile>, ScraperError>;
}
