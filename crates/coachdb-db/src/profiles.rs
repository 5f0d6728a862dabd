//! Database operations for the `profiles` table.
//!
//! Every write is keyed by `username`. The admin-curated columns (contact,
//! ads tracking, notes, tags) are never touched here.

use chrono::{DateTime, Utc};
use coachdb_core::Profile;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// The pipeline-owned columns of a `profiles` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub biography: Option<String>,
    pub external_urls: Option<String>,
    pub followers_count: i64,
    pub follows_count: i64,
    pub posts_count: i64,
    pub is_business_account: bool,
    pub is_professional_account: bool,
    pub verified: bool,
    pub profile_picture: Option<String>,
    pub profile_pic_url: Option<String>,
    pub profile_pic_url_hd: Option<String>,
    pub niche: String,
    pub is_partial: bool,
    pub last_fetched: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            bio: row.bio,
            biography: row.biography,
            external_urls: row.external_urls,
            followers_count: row.followers_count,
            follows_count: row.follows_count,
            posts_count: row.posts_count,
            is_business_account: row.is_business_account,
            is_professional_account: row.is_professional_account,
            verified: row.verified,
            profile_picture: row.profile_picture,
            profile_pic_url: row.profile_pic_url,
            profile_pic_url_hd: row.profile_pic_url_hd,
            niche: row.niche,
            is_partial: row.is_partial,
            last_fetched: row.last_fetched,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, username, full_name, bio, biography, external_urls, \
     followers_count, follows_count, posts_count, is_business_account, \
     is_professional_account, verified, profile_picture, profile_pic_url, \
     profile_pic_url_hd, niche, is_partial, last_fetched, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the profile stored under `username`, or `None`.
///
/// `username` must already be normalized (lowercase).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_profile_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<ProfileRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every stored profile whose username is in `usernames`.
///
/// Order is unspecified; missing usernames are simply absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_profiles_by_usernames(
    pool: &PgPool,
    usernames: &[String],
) -> Result<Vec<ProfileRow>, DbError> {
    if usernames.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = ANY($1)"
    ))
    .bind(usernames)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Inserts or updates the profile keyed by `username`.
///
/// On conflict every pipeline-owned column except `id` is replaced, so a
/// partial stub is upgraded in place when the full profile arrives.
///
/// When `id` already belongs to a row under another username and the new
/// username is not stored yet, that row is renamed first, so a renamed account
/// keeps its row (and its admin-curated columns).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the transaction fails.
pub async fn upsert_profile(pool: &PgPool, profile: &Profile) -> Result<ProfileRow, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE profiles SET username = $2, updated_at = NOW() \
         WHERE id = $1 AND username <> $2 \
           AND NOT EXISTS (SELECT 1 FROM profiles WHERE username = $2)",
    )
    .bind(&profile.id)
    .bind(&profile.username)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "INSERT INTO profiles \
             (id, username, full_name, bio, biography, external_urls, \
              followers_count, follows_count, posts_count, is_business_account, \
              is_professional_account, verified, profile_picture, profile_pic_url, \
              profile_pic_url_hd, niche, is_partial, last_fetched) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT (username) DO UPDATE SET \
             full_name               = EXCLUDED.full_name, \
             bio                     = EXCLUDED.bio, \
             biography               = EXCLUDED.biography, \
             external_urls           = EXCLUDED.external_urls, \
             followers_count         = EXCLUDED.followers_count, \
             follows_count           = EXCLUDED.follows_count, \
             posts_count             = EXCLUDED.posts_count, \
             is_business_account     = EXCLUDED.is_business_account, \
             is_professional_account = EXCLUDED.is_professional_account, \
             verified                = EXCLUDED.verified, \
             profile_picture         = EXCLUDED.profile_picture, \
             profile_pic_url         = EXCLUDED.profile_pic_url, \
             profile_pic_url_hd      = EXCLUDED.profile_pic_url_hd, \
             niche                   = EXCLUDED.niche, \
             is_partial              = EXCLUDED.is_partial, \
             last_fetched            = EXCLUDED.last_fetched, \
             updated_at              = NOW() \
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(&profile.id)
    .bind(&profile.username)
    .bind(&profile.full_name)
    .bind(&profile.bio)
    .bind(&profile.biography)
    .bind(&profile.external_urls)
    .bind(profile.followers_count.max(0))
    .bind(profile.follows_count.max(0))
    .bind(profile.posts_count.max(0))
    .bind(profile.is_business_account)
    .bind(profile.is_professional_account)
    .bind(profile.verified)
    .bind(&profile.profile_picture)
    .bind(&profile.profile_pic_url)
    .bind(&profile.profile_pic_url_hd)
    .bind(&profile.niche)
    .bind(profile.is_partial)
    .bind(profile.last_fetched)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Inserts `profile` only when neither its `username` nor its `id` exists yet.
///
/// Used for related-account stubs, which must never overwrite a stored
/// profile. Returns `true` when a row was inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_profile_if_absent(pool: &PgPool, profile: &Profile) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO profiles \
             (id, username, full_name, bio, biography, external_urls, \
              followers_count, follows_count, posts_count, is_business_account, \
              is_professional_account, verified, profile_picture, profile_pic_url, \
              profile_pic_url_hd, niche, is_partial, last_fetched) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT DO NOTHING",
    )
    .bind(&profile.id)
    .bind(&profile.username)
    .bind(&profile.full_name)
    .bind(&profile.bio)
    .bind(&profile.biography)
    .bind(&profile.external_urls)
    .bind(profile.followers_count.max(0))
    .bind(profile.follows_count.max(0))
    .bind(profile.posts_count.max(0))
    .bind(profile.is_business_account)
    .bind(profile.is_professional_account)
    .bind(profile.verified)
    .bind(&profile.profile_picture)
    .bind(&profile.profile_pic_url)
    .bind(&profile.profile_pic_url_hd)
    .bind(&profile.niche)
    .bind(profile.is_partial)
    .bind(profile.last_fetched)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Deletes the profile with the given `id`. Returns `true` if a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_profile(pool: &PgPool, id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Counts stored profiles, optionally restricted to one niche.
///
/// Partial stubs are excluded unless `include_partial` is set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_profiles(
    pool: &PgPool,
    niche: Option<&str>,
    include_partial: bool,
) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM profiles \
         WHERE ($1::TEXT IS NULL OR niche = $1) \
           AND ($2 OR is_partial = false)",
    )
    .bind(niche)
    .bind(include_partial)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
