//! Asynchronous snapshot jobs: trigger, progress, and result download.

use async_trait::async_trait;
use coachdb_core::{Profile, SnapshotProgress, SnapshotStatus};
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::{BrightDataClient, PROVIDER};
use crate::classify::screen;
use crate::error::ScraperError;
use crate::normalize::{normalize_brightdata, username_from_profile_url};
use crate::provider::BatchProvider;
use crate::response::{check_status, decode_json};
use crate::retry::retry_with_backoff;
use crate::types::{ProgressResponse, TriggerResponse};

/// Maps Bright Data's progress vocabulary onto [`SnapshotStatus`].
pub(crate) fn map_status(raw: Option<&str>) -> SnapshotStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("ready") => SnapshotStatus::Ready,
        Some("failed" | "error" | "canceled" | "cancelled") => SnapshotStatus::Failed,
        _ => SnapshotStatus::Running,
    }
}

/// Username hint for a snapshot record, taken from the URL it was collected
/// for.
fn record_hint(record: &Value) -> Option<String> {
    let input_url = record
        .get("input")
        .and_then(|input| input.get("url"))
        .and_then(Value::as_str);
    input_url
        .into_iter()
        .chain(["url", "profile_url"].iter().filter_map(|key| record.get(*key)?.as_str()))
        .find_map(username_from_profile_url)
}

fn has_error(record: &Value) -> bool {
    record
        .get("error")
        .is_some_and(|e| !e.is_null() && e.as_str() != Some(""))
}

#[async_trait]
impl BatchProvider for BrightDataClient {
    /// Single attempt: a retried trigger could start a duplicate job.
    async fn trigger_batch(&self, urls: &[String]) -> Result<String, ScraperError> {
        let url = self.endpoint(
            "datasets/v3/trigger",
            &[
                ("dataset_id", self.dataset_id.as_str()),
                ("include_errors", "true"),
            ],
        )?;
        let inputs: Vec<Value> = urls.iter().map(|u| json!({ "url": u })).collect();

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&inputs)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;
        let parsed: TriggerResponse = decode_json(response, "snapshot trigger").await?;

        let snapshot_id = parsed
            .snapshot_id
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ScraperError::malformed("snapshot trigger", "response has no snapshot_id")
            })?;

        tracing::info!(snapshot_id = %snapshot_id, inputs = urls.len(), "bright data snapshot triggered");
        Ok(snapshot_id)
    }

    async fn poll_status(&self, snapshot_id: &str) -> Result<SnapshotProgress, ScraperError> {
        let url = self.endpoint(&format!("datasets/v3/progress/{snapshot_id}"), &[])?;
        let context = format!("progress of snapshot {snapshot_id}");
        let context = context.as_str();

        let parsed: ProgressResponse = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url)
                    .bearer_auth(&self.api_key)
                    .send()
                    .await?;
                let response = check_status(PROVIDER, response).await?;
                decode_json(response, context).await
            }
        })
        .await?;

        let status = map_status(parsed.status.as_deref());
        let to_u64 = |v: Option<i64>| v.and_then(|n| u64::try_from(n).ok()).unwrap_or(0);
        let progress = SnapshotProgress {
            snapshot_id: snapshot_id.to_owned(),
            status,
            progress: to_u64(parsed.records),
            total: to_u64(parsed.inputs),
        };
        tracing::debug!(
            snapshot_id,
            status = %progress.status,
            progress = progress.progress,
            total = progress.total,
            "bright data snapshot progress"
        );
        Ok(progress)
    }

    async fn drain_results(&self, snapshot_id: &str) -> Result<Vec<Profile>, ScraperError> {
        let url = self.endpoint(
            &format!("datasets/v3/snapshot/{snapshot_id}"),
            &[("format", "json")],
        )?;
        let context = format!("snapshot {snapshot_id}");
        let context = context.as_str();

        let (status, body): (StatusCode, Value) =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                let url = url.clone();
                async move {
                    let response = self
                        .client
                        .get(url)
                        .bearer_auth(&self.api_key)
                        .send()
                        .await?;
                    let response = check_status(PROVIDER, response).await?;
                    let status = response.status();
                    let body: Value = decode_json(response, context).await?;
                    Ok((status, body))
                }
            })
            .await?;

        if status == StatusCode::ACCEPTED {
            return Err(ScraperError::Provider {
                provider: PROVIDER,
                status: status.as_u16(),
                message: format!("snapshot {snapshot_id} is not ready yet"),
            });
        }
        let Value::Array(records) = body else {
            return Err(ScraperError::malformed(context, "expected a JSON array of records"));
        };

        let total = records.len();
        let mut profiles = Vec::with_capacity(total);
        for record in &records {
            let hint = record_hint(record);
            if has_error(record) {
                tracing::debug!(snapshot_id, hint = ?hint, "dropping errored snapshot record");
                continue;
            }
            match normalize_brightdata(record, hint.as_deref().unwrap_or_default()) {
                Ok(Some(normalized)) => {
                    if let Some(profile) = screen(normalized.profile) {
                        profiles.push(profile);
                    }
                }
                Ok(None) => {
                    tracing::debug!(snapshot_id, hint = ?hint, "snapshot record has no usable profile");
                }
                Err(e) => {
                    tracing::warn!(snapshot_id, hint = ?hint, error = %e, "dropping malformed snapshot record");
                }
            }
        }

        tracing::info!(
            snapshot_id,
            records = total,
            kept = profiles.len(),
            "bright data snapshot drained"
        );
        Ok(profiles)
    }
}
