//! Database operations for the `bulk_jobs` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BulkJobRow {
    pub snapshot_id: String,
    /// Usernames of the profiles persisted by the drain, in drain order.
    pub usernames: Vec<String>,
    pub drained_at: DateTime<Utc>,
}

/// Returns the drain record for `snapshot_id`, or `None` if the snapshot has
/// not been drained yet.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_bulk_job(
    pool: &PgPool,
    snapshot_id: &str,
) -> Result<Option<BulkJobRow>, DbError> {
    let row = sqlx::query_as::<_, BulkJobRow>(
        "SELECT snapshot_id, usernames, drained_at FROM bulk_jobs WHERE snapshot_id = $1",
    )
    .bind(snapshot_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Records that `snapshot_id` has been drained. The first record wins; a
/// second call for the same snapshot is a no-op and returns `false`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_bulk_job(
    pool: &PgPool,
    snapshot_id: &str,
    usernames: &[String],
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO bulk_jobs (snapshot_id, usernames) VALUES ($1, $2) \
         ON CONFLICT (snapshot_id) DO NOTHING",
    )
    .bind(snapshot_id)
    .bind(usernames)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
