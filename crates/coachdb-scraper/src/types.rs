//! Provider response types.
//!
//! ## Observed shapes
//!
//! ### Bright Data (`/datasets/v3/scrape`, `/datasets/v3/snapshot/<id>`)
//! Snake-case records. `account` and `profile_image_link` may be masked with
//! `*` runs. `external_url` is usually an array of strings but older records
//! carry a single string. Counters arrive as integers, floats, or numeric
//! strings depending on the collector version. `id` may be a number.
//! `related_accounts` is an array of small stubs; individual entries are
//! decoded one by one so a single odd entry does not sink the record.
//!
//! ### HasData (`/scrape/instagram/profile`)
//! Camel-case record. The private flag has been seen as `private`,
//! `isPrivate` and `is_private`, sometimes more than one of them at once.
//!
//! ### Bright Data progress (`/datasets/v3/progress/<id>`)
//! `{"status": "running", "records": 3, "inputs": 10}`; `records` and
//! `inputs` are absent while the job is starting.

use serde::{Deserialize, Deserializer};

/// One profile record from a Bright Data dataset.
#[derive(Debug, Default, Deserialize)]
pub struct BrightDataProfile {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    /// Account handle. May be masked, e.g. `"mus***frau"`.
    #[serde(default)]
    pub account: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub profile_name: Option<String>,

    #[serde(default)]
    pub biography: Option<String>,

    /// Picture URL. May be masked.
    #[serde(default)]
    pub profile_image_link: Option<String>,

    #[serde(default)]
    pub profile_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub followers: Option<i64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub following: Option<i64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub posts_count: Option<i64>,

    #[serde(default)]
    pub is_business_account: Option<bool>,

    #[serde(default)]
    pub is_professional_account: Option<bool>,

    #[serde(default)]
    pub is_verified: Option<bool>,

    #[serde(default)]
    pub is_private: Option<bool>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub external_url: Option<String>,

    #[serde(default)]
    pub related_accounts: Option<Vec<serde_json::Value>>,
}

/// Entry of `related_accounts` in a Bright Data record.
#[derive(Debug, Default, Deserialize)]
pub struct BrightDataRelatedAccount {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub profile_name: Option<String>,

    #[serde(default)]
    pub profile_pic_url: Option<String>,

    #[serde(default)]
    pub is_private: Option<bool>,

    #[serde(default)]
    pub is_verified: Option<bool>,
}

/// Response to `POST /datasets/v3/trigger`.
#[derive(Debug, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

/// Response to `GET /datasets/v3/progress/<id>`.
#[derive(Debug, Deserialize)]
pub struct ProgressResponse {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub records: Option<i64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub inputs: Option<i64>,
}

/// One profile from HasData.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasDataProfile {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub biography: Option<String>,

    #[serde(default)]
    pub profile_pic_url: Option<String>,

    #[serde(default, rename = "profilePicUrlHD")]
    pub profile_pic_url_hd: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub followers_count: Option<i64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub follows_count: Option<i64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub posts_count: Option<i64>,

    #[serde(default)]
    pub is_business_account: Option<bool>,

    #[serde(default)]
    pub is_professional_account: Option<bool>,

    #[serde(default)]
    pub verified: Option<bool>,

    #[serde(default, rename = "private", deserialize_with = "lenient_flag")]
    pub private_flag: Option<bool>,

    #[serde(default, rename = "isPrivate", deserialize_with = "lenient_flag")]
    pub is_private_flag: Option<bool>,

    #[serde(default, rename = "is_private", deserialize_with = "lenient_flag")]
    pub is_private_snake_flag: Option<bool>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub external_url: Option<String>,
}

impl HasDataProfile {
    /// `true` if any of the private-flag spellings is set.
    #[must_use]
    pub fn is_private(&self) -> bool {
        [
            self.private_flag,
            self.is_private_flag,
            self.is_private_snake_flag,
        ]
        .contains(&Some(true))
    }
}

// ---- lenient field decoders ----

/// Accepts a boolean or a `"true"`/`"false"` string. Anything else decodes
/// as `None`.
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) => s.trim().parse::<bool>().ok(),
        _ => None,
    })
}

/// Accepts a count as an integer, a float (truncated) or a numeric string.
/// Anything else decodes as `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value))
}

#[allow(clippy::cast_possible_truncation)]
fn count_from_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        serde_json::Value::String(s) => {
            let s = s.trim().replace(',', "");
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Accepts an id as a string or a number.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a single string or an array of strings; keeps the first non-empty
/// entry.
fn string_or_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let non_empty = |s: &str| Some(s.trim().to_owned()).filter(|s| !s.is_empty());
    Ok(match value {
        Some(serde_json::Value::String(s)) => non_empty(&s),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(serde_json::Value::as_str)
            .find_map(non_empty),
        _ => None,
    })
}
