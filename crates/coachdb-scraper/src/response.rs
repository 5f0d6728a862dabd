//! Shared status handling for provider responses.

use serde::de::DeserializeOwned;

use crate::error::ScraperError;

/// Seconds to wait when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Maps a non-2xx response to a typed error and returns successful responses
/// untouched.
///
/// 429 becomes [`ScraperError::RateLimited`]; any other failure status becomes
/// [`ScraperError::Provider`] carrying the provider's own message when the body
/// has one.
pub(crate) async fn check_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ScraperError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ScraperError::RateLimited {
            provider,
            retry_after_secs,
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScraperError::Provider {
            provider,
            status: status.as_u16(),
            message: error_message(&body, status.as_u16()),
        });
    }

    Ok(response)
}

/// Reads the body as text and decodes it as `T`.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, ScraperError> {
    let body = response.text().await?;
    serde_json::from_str::<T>(&body).map_err(|e| ScraperError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

/// Pulls a human-readable message out of an error body.
///
/// Looks at `message`, `error` and `detail` in that order, falling back to
/// `"API error: <status>"`.
pub(crate) fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error", "detail"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(serde_json::Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            })
        })
        .unwrap_or_else(|| format!("API error: {status}"))
}
