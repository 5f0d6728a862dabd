//! HTTP client for the HasData Instagram profile endpoint.
//!
//! Synchronous only; HasData has no batch capability.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::classify::screen;
use crate::error::ScraperError;
use crate::normalize::normalize_hasdata;
use crate::provider::{FetchedProfile, ProfileProvider};
use crate::response::{check_status, decode_json};
use crate::retry::retry_with_backoff;
use crate::ClientSettings;

const DEFAULT_BASE_URL: &str = "https://api.hasdata.com/";
const PROVIDER: &str = "hasdata";

pub struct HasDataClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HasDataClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, settings: &ClientSettings) -> Result<Self, ScraperError> {
        Self::with_base_url(api_key, settings, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be built or
    /// [`ScraperError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        settings: &ClientSettings,
        base_url: &str,
    ) -> Result<Self, ScraperError> {
        let client = settings.build_client()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ScraperError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url: parsed,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
        })
    }

    fn profile_url(&self, username: &str) -> Result<Url, ScraperError> {
        let mut url =
            self.base_url
                .join("scrape/instagram/profile")
                .map_err(|e| ScraperError::InvalidBaseUrl {
                    base_url: self.base_url.to_string(),
                    reason: e.to_string(),
                })?;
        url.query_pairs_mut().append_pair("handle", username);
        Ok(url)
    }
}

#[async_trait]
impl ProfileProvider for HasDataClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_one(&self, username: &str) -> Result<Option<FetchedProfile>, ScraperError> {
        let url = self.profile_url(username)?;
        let context = format!("hasdata profile \"{username}\"");
        let context = context.as_str();

        let body: Option<Value> = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url)
                    .header("x-api-key", &self.api_key)
                    .send()
                    .await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let response = check_status(PROVIDER, response).await?;
                decode_json(response, context).await.map(Some)
            }
        })
        .await?;

        let Some(body) = body else {
            tracing::info!(username, provider = PROVIDER, "profile not found");
            return Ok(None);
        };
        let Some(profile) = normalize_hasdata(&body, username)?.and_then(screen) else {
            return Ok(None);
        };

        Ok(Some(FetchedProfile {
            profile,
            related: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_encodes_handle() {
        let client =
            HasDataClient::with_base_url("k", &ClientSettings::default(), "https://api.hasdata.com")
                .expect("client");
        let url = client.profile_url("anna fit").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.hasdata.com/scrape/instagram/profile?handle=anna+fit"
        );
    }
}
