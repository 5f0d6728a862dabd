use std::time::Duration;

use coachdb_acquire::{ProfileFilter, NOT_FOUND_MESSAGE};
use coachdb_core::{AppConfig, Niche, SnapshotStatus};
use serde::Serialize;

use crate::wiring;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport<'a> {
    count: i64,
    niche: Option<&'a str>,
    include_partial: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteReport<'a> {
    id: &'a str,
    deleted: bool,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run_fetch(
    config: &AppConfig,
    username: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let orchestrator = wiring::build_orchestrator(config, dry_run).await?;
    let acquisition = orchestrator
        .acquire_one(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("{username}: {NOT_FOUND_MESSAGE}"))?;
    print_json(&acquisition)
}

pub(crate) async fn run_fetch_many(
    config: &AppConfig,
    usernames: &[String],
    dry_run: bool,
) -> anyhow::Result<()> {
    let orchestrator = wiring::build_orchestrator(config, dry_run).await?;
    let outcome = orchestrator.acquire_many(usernames).await;
    tracing::info!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        related = outcome.related.len(),
        "fetch-many finished"
    );
    print_json(&outcome)
}

pub(crate) async fn run_bulk_trigger(config: &AppConfig, urls: &[String]) -> anyhow::Result<()> {
    let orchestrator = wiring::build_orchestrator(config, false).await?;
    let trigger = orchestrator.trigger_bulk(urls).await?;
    print_json(&trigger)
}

pub(crate) async fn run_bulk_poll(config: &AppConfig, job_handle: &str) -> anyhow::Result<()> {
    let orchestrator = wiring::build_orchestrator(config, false).await?;
    let poll = orchestrator.poll_bulk(job_handle).await?;
    print_json(&poll)
}

pub(crate) async fn run_bulk_wait(
    config: &AppConfig,
    job_handle: &str,
    interval_secs: u64,
    max_polls: u32,
) -> anyhow::Result<()> {
    if max_polls == 0 {
        anyhow::bail!("--max-polls must be at least 1");
    }
    let orchestrator = wiring::build_orchestrator(config, false).await?;
    let interval = Duration::from_secs(interval_secs);

    for attempt in 1..=max_polls {
        let poll = orchestrator.poll_bulk(job_handle).await?;
        match poll.status {
            SnapshotStatus::Ready => return print_json(&poll),
            SnapshotStatus::Failed => anyhow::bail!("job {job_handle} failed"),
            SnapshotStatus::Running => {
                tracing::info!(
                    snapshot_id = job_handle,
                    attempt,
                    progress = poll.progress,
                    total = poll.total,
                    "job still running"
                );
                if attempt < max_polls {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    anyhow::bail!("job {job_handle} still running after {max_polls} polls")
}

pub(crate) async fn run_stats(
    config: &AppConfig,
    niche: Option<&str>,
    include_partial: bool,
) -> anyhow::Result<()> {
    let niche = niche
        .map(|raw| {
            Niche::parse(raw).ok_or_else(|| {
                let known: Vec<&str> = Niche::ALL.iter().map(|n| n.as_str()).collect();
                anyhow::anyhow!("unknown niche \"{raw}\"; expected one of: {}", known.join(", "))
            })
        })
        .transpose()?;

    let store = wiring::build_store(config, false).await?;
    let filter = ProfileFilter {
        niche: niche.map(|n| n.as_str().to_owned()),
        include_partial,
    };
    let count = store.count(&filter).await?;
    print_json(&StatsReport {
        count,
        niche: niche.map(Niche::as_str),
        include_partial,
    })
}

pub(crate) async fn run_delete(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let store = wiring::build_store(config, false).await?;
    let deleted = store.delete_by_id(id).await?;
    if !deleted {
        tracing::warn!(id, "no profile with that id");
    }
    print_json(&DeleteReport { id, deleted })
}
