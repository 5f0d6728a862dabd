//! HTTP client for the Bright Data datasets API.
//!
//! The synchronous scrape endpoint backs [`ProfileProvider::fetch_one`]; the
//! trigger/progress/snapshot endpoints back the batch capability in
//! [`batch`].

mod batch;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};

use crate::classify::screen;
use crate::error::ScraperError;
use crate::normalize::normalize_brightdata;
use crate::provider::{BatchProvider, FetchedProfile, ProfileProvider};
use crate::response::{check_status, decode_json};
use crate::retry::retry_with_backoff;
use crate::ClientSettings;

const DEFAULT_BASE_URL: &str = "https://api.brightdata.com/";
pub(crate) const PROVIDER: &str = "bright data";

/// Client for Bright Data's Instagram profile dataset.
///
/// Use [`BrightDataClient::new`] for production or
/// [`BrightDataClient::with_base_url`] to point at a mock server in tests.
pub struct BrightDataClient {
    client: Client,
    api_key: String,
    dataset_id: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl BrightDataClient {
    /// Creates a client pointed at the production Bright Data API.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        dataset_id: &str,
        settings: &ClientSettings,
    ) -> Result<Self, ScraperError> {
        Self::with_base_url(api_key, dataset_id, settings, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ScraperError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        dataset_id: &str,
        settings: &ClientSettings,
        base_url: &str,
    ) -> Result<Self, ScraperError> {
        let client = settings.build_client()?;

        // Exactly one trailing slash so relative joins keep any path prefix.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ScraperError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            dataset_id: dataset_id.to_owned(),
            base_url: parsed,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
        })
    }

    /// Builds an endpoint URL under the base URL with percent-encoded query
    /// parameters.
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ScraperError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ScraperError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: format!("cannot join \"{path}\": {e}"),
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn scrape_url(&self) -> Result<Url, ScraperError> {
        self.endpoint(
            "datasets/v3/scrape",
            &[
                ("dataset_id", self.dataset_id.as_str()),
                ("notify", "false"),
                ("include_errors", "true"),
                ("type", "discover_new"),
                ("discover_by", "user_name"),
            ],
        )
    }

    /// Posts one username to the synchronous scrape endpoint.
    ///
    /// `Ok(None)` on 404. A 202 means the scrape outlived the synchronous
    /// window and is reported as a provider error.
    async fn scrape_raw(&self, username: &str) -> Result<Option<Value>, ScraperError> {
        let url = self.scrape_url()?;
        let payload = json!({ "input": [{ "user_name": username }] });
        let payload = &payload;
        let context = format!("scrape of \"{username}\"");
        let context = context.as_str();

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.api_key)
                    .json(payload)
                    .send()
                    .await?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let response = check_status(PROVIDER, response).await?;
                let status = response.status();
                let body: Value = decode_json(response, context).await?;

                if status == StatusCode::ACCEPTED {
                    let snapshot = body
                        .get("snapshot_id")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    return Err(ScraperError::Provider {
                        provider: PROVIDER,
                        status: status.as_u16(),
                        message: format!(
                            "scrape did not finish in time (snapshot {snapshot}); try again later"
                        ),
                    });
                }
                Ok(Some(body))
            }
        })
        .await
    }
}

#[async_trait]
impl ProfileProvider for BrightDataClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_one(&self, username: &str) -> Result<Option<FetchedProfile>, ScraperError> {
        let Some(body) = self.scrape_raw(username).await? else {
            tracing::info!(username, provider = PROVIDER, "profile not found");
            return Ok(None);
        };

        let Some(normalized) = normalize_brightdata(&body, username)? else {
            tracing::info!(username, provider = PROVIDER, "no usable profile in response");
            return Ok(None);
        };
        let Some(profile) = screen(normalized.profile) else {
            return Ok(None);
        };
        let related: Vec<_> = normalized.related.into_iter().filter_map(screen).collect();

        tracing::debug!(
            username = %profile.username,
            related = related.len(),
            "bright data profile normalized"
        );
        Ok(Some(FetchedProfile { profile, related }))
    }

    fn batch(&self) -> Option<&dyn BatchProvider> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> BrightDataClient {
        BrightDataClient::with_base_url(
            "test-key",
            "gd_test",
            &ClientSettings::default(),
            base_url,
        )
        .expect("client construction should not fail")
    }

    #[test]
    fn scrape_url_carries_dataset_and_discovery_params() {
        let client = test_client("https://api.brightdata.com");
        let url = client.scrape_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.brightdata.com/datasets/v3/scrape?dataset_id=gd_test&notify=false\
             &include_errors=true&type=discover_new&discover_by=user_name"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = test_client("http://127.0.0.1:9999/proxy/");
        let url = client.endpoint("datasets/v3/progress/s_1", &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9999/proxy/datasets/v3/progress/s_1"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = BrightDataClient::with_base_url(
            "k",
            "d",
            &ClientSettings::default(),
            "not a url",
        );
        assert!(matches!(result, Err(ScraperError::InvalidBaseUrl { .. })));
    }
}
