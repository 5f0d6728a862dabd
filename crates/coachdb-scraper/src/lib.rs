pub mod brightdata;
pub mod classify;
pub mod error;
pub mod hasdata;
pub mod image;
pub mod mask;
pub mod normalize;
pub mod provider;
mod response;
mod retry;
pub mod types;

pub use brightdata::BrightDataClient;
pub use classify::{classify, screen, Classification};
pub use error::ScraperError;
pub use hasdata::HasDataClient;
pub use image::{ImageRelocator, ObjectStorage, SupabaseStorage};
pub use normalize::{
    normalize_brightdata, normalize_hasdata, username_from_profile_url, NormalizedProfile,
};
pub use provider::{BatchProvider, FetchedProfile, ProfileProvider};

/// HTTP settings shared by every provider client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Additional attempts after the first failure for transient errors.
    pub max_retries: u32,
    /// Base delay for exponential backoff: `backoff_base_ms * 2^(attempt - 1)`.
    pub backoff_base_ms: u64,
}

impl ClientSettings {
    #[must_use]
    pub fn from_app_config(config: &coachdb_core::AppConfig) -> Self {
        Self {
            timeout_secs: config.scraper_request_timeout_secs,
            user_agent: config.scraper_user_agent.clone(),
            max_retries: config.scraper_max_retries,
            backoff_base_ms: config.scraper_retry_backoff_base_ms,
        }
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(&self.user_agent)
            .build()?;
        Ok(client)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 90,
            user_agent: "coachdb/0.1 (profile-directory)".to_string(),
            max_retries: 2,
            backoff_base_ms: 1_000,
        }
    }
}
