use crate::app_config::{AppConfig, Environment, ProviderKind};
use crate::ConfigError;

const DEFAULT_BRIGHT_DATA_DATASET_ID: &str = "gd_l1vikfch901nx3by4";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected true/false, got \"{raw}\""),
            }),
        }
    };

    // only commands that open a pool need it; see `AppConfig::require_database_url`
    let database_url = optional("DATABASE_URL");
    let env = parse_environment(&or_default("COACHDB_ENV", "development"))?;
    let log_level = or_default("COACHDB_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("COACHDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("COACHDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("COACHDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let provider = parse_provider(&or_default("COACHDB_PROVIDER", "brightdata"))?;
    let bright_data_api_key = optional("BRIGHT_DATA_API_KEY");
    let hasdata_api_key = optional("HASDATA_API_KEY");
    match provider {
        ProviderKind::BrightData if bright_data_api_key.is_none() => {
            return Err(ConfigError::MissingEnvVar("BRIGHT_DATA_API_KEY".to_string()));
        }
        ProviderKind::HasData if hasdata_api_key.is_none() => {
            return Err(ConfigError::MissingEnvVar("HASDATA_API_KEY".to_string()));
        }
        _ => {}
    }
    let bright_data_dataset_id = or_default("BRIGHT_DATA_DATASET_ID", DEFAULT_BRIGHT_DATA_DATASET_ID);

    let supabase_url = optional("SUPABASE_URL");
    let supabase_service_key = optional("SUPABASE_SERVICE_ROLE_KEY");
    let storage_bucket = or_default("COACHDB_STORAGE_BUCKET", "profile-pictures");

    let freshness_days = parse_u32("COACHDB_FRESHNESS_DAYS", "30")?;
    if freshness_days == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "COACHDB_FRESHNESS_DAYS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let inter_request_delay_ms = parse_u64("COACHDB_INTER_REQUEST_DELAY_MS", "1000")?;
    let persist_related = parse_bool("COACHDB_PERSIST_RELATED", false)?;
    let bulk_result_ttl_secs = parse_u64("COACHDB_BULK_RESULT_TTL_SECS", "3600")?;

    let scraper_request_timeout_secs = parse_u64("COACHDB_SCRAPER_REQUEST_TIMEOUT_SECS", "90")?;
    let scraper_user_agent = or_default(
        "COACHDB_SCRAPER_USER_AGENT",
        "coachdb/0.1 (profile-directory)",
    );
    let scraper_max_retries = parse_u32("COACHDB_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_ms = parse_u64("COACHDB_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        provider,
        bright_data_api_key,
        bright_data_dataset_id,
        hasdata_api_key,
        supabase_url,
        supabase_service_key,
        storage_bucket,
        freshness_days,
        inter_request_delay_ms,
        persist_related,
        bulk_result_ttl_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "COACHDB_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_provider(s: &str) -> Result<ProviderKind, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "brightdata" | "bright_data" | "bright-data" => Ok(ProviderKind::BrightData),
        "hasdata" => Ok(ProviderKind::HasData),
        other => Err(ConfigError::InvalidEnvVar {
            var: "COACHDB_PROVIDER".to_string(),
            reason: format!("unknown provider \"{other}\" (expected brightdata or hasdata)"),
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
