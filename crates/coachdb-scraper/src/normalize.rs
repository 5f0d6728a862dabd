//! Normalization from raw provider JSON to [`coachdb_core::Profile`].
//!
//! Handles array-or-object payloads, error envelopes, private accounts,
//! masked strings and URL validation. Scope classification is left to
//! [`crate::classify::screen`].

use coachdb_core::{normalize_username, Profile};
use serde_json::Value;

use crate::error::ScraperError;
use crate::mask::{reconstruct_masked, strip_mask};
use crate::types::{BrightDataProfile, BrightDataRelatedAccount, HasDataProfile};

/// Fields whose presence marks an object as a profile record.
const IDENTIFYING_FIELDS: &[&str] = &["id", "account", "username"];

/// First path segments on instagram.com that are not account handles.
const RESERVED_PATHS: &[&str] = &[
    "p", "reel", "reels", "stories", "explore", "accounts", "tv",
];

/// A normalized main profile plus the related-account stubs that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProfile {
    pub profile: Profile,
    /// Partial profiles built from `related_accounts`; private and unnamed
    /// entries are already removed.
    pub related: Vec<Profile>,
}

/// Normalizes a Bright Data response for `requested`.
///
/// Returns `Ok(None)` for `null`, an empty array, an error envelope, or a
/// private account.
///
/// # Errors
///
/// - [`ScraperError::MalformedResponse`] if the payload has no recognizable
///   profile record or no username can be derived.
/// - [`ScraperError::Deserialize`] if the record's fields have unexpected types.
pub fn normalize_brightdata(
    raw: &Value,
    requested: &str,
) -> Result<Option<NormalizedProfile>, ScraperError> {
    let context = format!("bright data profile for \"{requested}\"");
    let Some(payload) = unwrap_payload(raw, &context)? else {
        return Ok(None);
    };
    let record: BrightDataProfile =
        serde_json::from_value(payload.clone()).map_err(|e| ScraperError::Deserialize {
            context: context.clone(),
            source: e,
        })?;

    if record.is_private == Some(true) {
        tracing::debug!(requested, "bright data profile is private, skipping");
        return Ok(None);
    }

    let requested = normalize_username(requested);
    let username = resolve_username(record.account.as_deref(), &requested);
    if username.is_empty() {
        return Err(ScraperError::malformed(context, "record has no usable username"));
    }

    let mut profile = Profile::new(resolve_id(record.id, &requested, &username), &username);
    profile.full_name = clean_text(record.full_name.or(record.profile_name).as_deref());
    profile.bio = trimmed(record.biography.as_deref());
    profile.biography.clone_from(&profile.bio);
    profile.external_urls = clean_text(record.external_url.as_deref());
    profile.followers_count = clamp_count(record.followers);
    profile.follows_count = clamp_count(record.following);
    profile.posts_count = clamp_count(record.posts_count);
    profile.is_business_account = record.is_business_account.unwrap_or(false);
    profile.is_professional_account = record.is_professional_account.unwrap_or(false);
    profile.verified = record.is_verified.unwrap_or(false);

    let picture = record.profile_image_link.as_deref().and_then(sanitize_url);
    profile.profile_picture.clone_from(&picture);
    profile.profile_pic_url = picture;

    let related = record
        .related_accounts
        .iter()
        .flatten()
        .filter_map(normalize_related)
        .collect();

    Ok(Some(NormalizedProfile { profile, related }))
}

/// Normalizes a HasData response for `requested`.
///
/// Same `Ok(None)` rules as [`normalize_brightdata`]. HasData carries no
/// related accounts.
///
/// # Errors
///
/// Same as [`normalize_brightdata`].
pub fn normalize_hasdata(raw: &Value, requested: &str) -> Result<Option<Profile>, ScraperError> {
    let context = format!("hasdata profile for \"{requested}\"");
    let Some(payload) = unwrap_payload(raw, &context)? else {
        return Ok(None);
    };
    let record: HasDataProfile =
        serde_json::from_value(payload.clone()).map_err(|e| ScraperError::Deserialize {
            context: context.clone(),
            source: e,
        })?;

    if record.is_private() {
        tracing::debug!(requested, "hasdata profile is private, skipping");
        return Ok(None);
    }

    let requested = normalize_username(requested);
    let username = resolve_username(record.username.as_deref(), &requested);
    if username.is_empty() {
        return Err(ScraperError::malformed(context, "record has no usable username"));
    }

    let mut profile = Profile::new(resolve_id(record.id, &requested, &username), &username);
    profile.full_name = clean_text(record.full_name.as_deref());
    profile.bio = trimmed(record.biography.as_deref());
    profile.biography.clone_from(&profile.bio);
    profile.external_urls = clean_text(record.external_url.as_deref());
    profile.followers_count = clamp_count(record.followers_count);
    profile.follows_count = clamp_count(record.follows_count);
    profile.posts_count = clamp_count(record.posts_count);
    profile.is_business_account = record.is_business_account.unwrap_or(false);
    profile.is_professional_account = record.is_professional_account.unwrap_or(false);
    profile.verified = record.verified.unwrap_or(false);

    let picture = record.profile_pic_url.as_deref().and_then(sanitize_url);
    let picture_hd = record.profile_pic_url_hd.as_deref().and_then(sanitize_url);
    profile.profile_picture = picture.clone().or_else(|| picture_hd.clone());
    profile.profile_pic_url = picture;
    profile.profile_pic_url_hd = picture_hd;

    Ok(Some(profile))
}

/// Strips the mask from `raw` and accepts it only as an absolute
/// `http`/`https` URL.
#[must_use]
pub fn sanitize_url(raw: &str) -> Option<String> {
    let stripped = strip_mask(raw);
    let lower = stripped.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }
    reqwest::Url::parse(&stripped)
        .ok()
        .filter(|url| url.host_str().is_some())
        .map(|_| stripped)
}

/// Extracts the account handle from an Instagram profile URL.
///
/// Accepts URLs with or without a scheme (`instagram.com/name`). Post, reel
/// and other non-profile paths yield `None`.
#[must_use]
pub fn username_from_profile_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = reqwest::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host != "instagram.com" && !host.ends_with(".instagram.com") {
        return None;
    }

    let segment = parsed.path_segments()?.find(|s| !s.is_empty())?;
    let handle = normalize_username(segment);
    if handle.is_empty()
        || RESERVED_PATHS.contains(&handle.as_str())
        || !handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return None;
    }
    Some(handle)
}

// ---- helpers ----

/// Picks the record out of a response body.
///
/// `null`, `[]`, `[null]` and error envelopes are "no profile"; scalars and
/// objects without identifying or error fields are malformed.
fn unwrap_payload<'a>(raw: &'a Value, context: &str) -> Result<Option<&'a Value>, ScraperError> {
    let candidate = match raw {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Ok(None),
        },
        other => other,
    };

    match candidate {
        Value::Null => Ok(None),
        Value::Object(map) => {
            let identified = IDENTIFYING_FIELDS
                .iter()
                .any(|field| map.get(*field).is_some_and(is_present));
            if identified {
                return Ok(Some(candidate));
            }
            if map.contains_key("error") || map.contains_key("message") {
                tracing::warn!(
                    context,
                    error = %error_summary(map),
                    "provider returned an error payload"
                );
                return Ok(None);
            }
            Err(ScraperError::malformed(
                context,
                "object has no identifying field (id, account, username)",
            ))
        }
        _ => Err(ScraperError::malformed(
            context,
            "expected a profile object or an array of profiles",
        )),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn error_summary(map: &serde_json::Map<String, Value>) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| map.get(*key))
        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned))
        .unwrap_or_default()
}

fn normalize_related(raw: &Value) -> Option<Profile> {
    let account: BrightDataRelatedAccount = match serde_json::from_value(raw.clone()) {
        Ok(account) => account,
        Err(e) => {
            tracing::debug!(error = %e, "skipping undecodable related account");
            return None;
        }
    };
    if account.is_private == Some(true) {
        return None;
    }

    let username = account
        .user_name
        .as_deref()
        .map(|name| normalize_username(&strip_mask(name)))
        .unwrap_or_default();
    if username.is_empty() {
        return None;
    }

    let mut profile = Profile::new(account.id.unwrap_or_else(|| username.clone()), &username);
    profile.full_name = clean_text(account.profile_name.as_deref());
    let picture = account.profile_pic_url.as_deref().and_then(sanitize_url);
    profile.profile_picture.clone_from(&picture);
    profile.profile_pic_url = picture;
    profile.verified = account.is_verified.unwrap_or(false);
    profile.is_partial = true;
    Some(profile)
}

fn resolve_username(raw: Option<&str>, requested: &str) -> String {
    let hint = Some(requested).filter(|r| !r.is_empty());
    raw.map(|value| normalize_username(&reconstruct_masked(value, hint)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| requested.to_owned())
}

fn resolve_id(id: Option<String>, requested: &str, username: &str) -> String {
    id.unwrap_or_else(|| {
        if requested.is_empty() {
            username.to_owned()
        } else {
            requested.to_owned()
        }
    })
}

/// Mask-stripped, trimmed, non-empty text.
fn clean_text(value: Option<&str>) -> Option<String> {
    value.map(strip_mask).filter(|s| !s.is_empty())
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

fn clamp_count(value: Option<i64>) -> i64 {
    value.unwrap_or(0).max(0)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
