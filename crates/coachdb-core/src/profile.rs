use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Niche;

/// Canonical record for one scraped Instagram account.
///
/// `username` is the business key: it is always stored lowercase and acts as
/// the cache key independently of the provider-assigned `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
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
    #[serde(rename = "profilePicUrlHD")]
    pub profile_pic_url_hd: Option<String>,
    pub niche: String,
    pub is_partial: bool,
    pub last_fetched: Option<DateTime<Utc>>,
}

impl Profile {
    /// Creates an empty, non-partial profile with every optional field unset,
    /// counters at zero and the catch-all niche.
    #[must_use]
    pub fn new(id: impl Into<String>, username: &str) -> Self {
        Self {
            id: id.into(),
            username: normalize_username(username),
            full_name: None,
            bio: None,
            biography: None,
            external_urls: None,
            followers_count: 0,
            follows_count: 0,
            posts_count: 0,
            is_business_account: false,
            is_professional_account: false,
            verified: false,
            profile_picture: None,
            profile_pic_url: None,
            profile_pic_url_hd: None,
            niche: Niche::default().to_string(),
            is_partial: false,
            last_fetched: None,
        }
    }

    /// The best remote picture to relocate: HD when present, otherwise the
    /// regular picture URL.
    #[must_use]
    pub fn picture_source(&self) -> Option<&str> {
        self.profile_pic_url_hd
            .as_deref()
            .or(self.profile_pic_url.as_deref())
            .or(self.profile_picture.as_deref())
    }

    /// Points every picture field at `url`.
    pub fn set_picture(&mut self, url: &str) {
        self.profile_picture = Some(url.to_owned());
        self.profile_pic_url = Some(url.to_owned());
        if self.profile_pic_url_hd.is_some() {
            self.profile_pic_url_hd = Some(url.to_owned());
        }
    }
}

/// Canonical form of an Instagram handle: trimmed, leading `@` removed,
/// lowercased.
#[must_use]
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

/// Canonical lifecycle state of an asynchronous provider snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Running,
    Ready,
    Failed,
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStatus::Running => write!(f, "running"),
            SnapshotStatus::Ready => write!(f, "ready"),
            SnapshotStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress report for a snapshot, suitable for UI progress bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotProgress {
    pub snapshot_id: String,
    pub status: SnapshotStatus,
    pub progress: u64,
    pub total: u64,
}
