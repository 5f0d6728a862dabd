//! Profile picture relocation to durable object storage.
//!
//! Provider CDN links expire, so pictures are copied into a storage bucket
//! and the profile is pointed at the permanent public URL. Relocation is
//! best-effort: any failure leaves the remote URL in place.

use std::sync::Arc;

use async_trait::async_trait;
use coachdb_core::{normalize_username, Profile};
use reqwest::{header, Client};

use crate::error::ScraperError;
use crate::ClientSettings;

/// Largest image accepted for relocation.
pub const MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;

/// Image upload backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Copies the image at `remote_url` into storage under `key` and returns
    /// its permanent public URL.
    ///
    /// `Ok(None)` means the remote content was rejected (not an image, too
    /// large, unreachable); errors are transport or upload failures.
    async fn upload_image(&self, remote_url: &str, key: &str)
        -> Result<Option<String>, ScraperError>;
}

/// File extension for an image content type. Unknown types map to `jpg`.
#[must_use]
pub fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Supabase Storage REST backend.
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        service_key: &str,
        bucket: &str,
        settings: &ClientSettings,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: settings.build_client()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            service_key: service_key.to_owned(),
            bucket: bucket.to_owned(),
        })
    }

    fn object_url(&self, object: &str) -> String {
        format!("{}/storage/v1/object/{}/{object}", self.base_url, self.bucket)
    }

    fn public_url(&self, object: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{object}",
            self.base_url, self.bucket
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload_image(
        &self,
        remote_url: &str,
        key: &str,
    ) -> Result<Option<String>, ScraperError> {
        let download = self.client.get(remote_url).send().await?;
        if !download.status().is_success() {
            tracing::debug!(remote_url, status = download.status().as_u16(), "image download rejected");
            return Ok(None);
        }

        let content_type = download
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            tracing::debug!(remote_url, content_type = %content_type, "remote content is not an image");
            return Ok(None);
        }
        if download.content_length().is_some_and(|len| len > MAX_IMAGE_BYTES) {
            tracing::debug!(remote_url, "image exceeds size limit");
            return Ok(None);
        }

        let bytes = download.bytes().await?;
        if bytes.is_empty() || bytes.len() as u64 > MAX_IMAGE_BYTES {
            tracing::debug!(remote_url, size = bytes.len(), "image body empty or too large");
            return Ok(None);
        }

        let object = format!("{key}.{}", extension_for(&content_type));
        let upload = self
            .client
            .post(self.object_url(&object))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = upload.status();
        if !status.is_success() {
            let body = upload.text().await.unwrap_or_default();
            return Err(ScraperError::Storage(format!(
                "upload of {object} failed with HTTP {}: {}",
                status.as_u16(),
                crate::response::error_message(&body, status.as_u16())
            )));
        }

        Ok(Some(self.public_url(&object)))
    }
}

/// Replaces remote picture URLs with storage URLs.
///
/// Never fails: without a backend, or on any backend failure, the remote URL
/// is returned unchanged.
#[derive(Clone, Default)]
pub struct ImageRelocator {
    storage: Option<Arc<dyn ObjectStorage>>,
}

impl ImageRelocator {
    #[must_use]
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { storage: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.storage.is_some()
    }

    pub async fn relocate(&self, remote_url: &str, username: &str) -> String {
        let Some(storage) = &self.storage else {
            return remote_url.to_owned();
        };
        let key = normalize_username(username);
        match storage.upload_image(remote_url, &key).await {
            Ok(Some(url)) => {
                tracing::debug!(username = %key, url = %url, "profile picture relocated");
                url
            }
            Ok(None) => {
                tracing::warn!(username = %key, remote_url, "profile picture rejected, keeping remote URL");
                remote_url.to_owned()
            }
            Err(e) => {
                tracing::warn!(username = %key, remote_url, error = %e, "profile picture upload failed, keeping remote URL");
                remote_url.to_owned()
            }
        }
    }

    /// Relocates the profile's best picture and points every picture field at
    /// the result. Profiles without a picture are left untouched.
    pub async fn relocate_profile(&self, profile: &mut Profile) {
        if !self.is_enabled() {
            return;
        }
        let Some(source) = profile.picture_source().map(str::to_owned) else {
            return;
        };
        let url = self.relocate(&source, &profile.username).await;
        if url != source {
            profile.set_picture(&url);
        }
    }
}

impl std::fmt::Debug for ImageRelocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRelocator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
