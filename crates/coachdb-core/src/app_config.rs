use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which scraping backend a deployment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    BrightData,
    HasData,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::BrightData => write!(f, "brightdata"),
            ProviderKind::HasData => write!(f, "hasdata"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub provider: ProviderKind,
    pub bright_data_api_key: Option<String>,
    pub bright_data_dataset_id: String,
    pub hasdata_api_key: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    pub storage_bucket: String,
    /// Maximum age of `last_fetched` for a stored profile to count as a cache
    /// hit. One value per deployment, shared by single and bulk acquisition.
    pub freshness_days: u32,
    pub inter_request_delay_ms: u64,
    pub persist_related: bool,
    pub bulk_result_ttl_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
}

impl AppConfig {
    /// The Postgres URL, for commands that actually connect.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }

    /// Whether both Supabase settings are present, enabling image relocation.
    #[must_use]
    pub fn storage_enabled(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_service_key.is_some()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("provider", &self.provider)
            .field(
                "bright_data_api_key",
                &self.bright_data_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("bright_data_dataset_id", &self.bright_data_dataset_id)
            .field(
                "hasdata_api_key",
                &self.hasdata_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_service_key",
                &self.supabase_service_key.as_ref().map(|_| "[redacted]"),
            )
            .field("storage_bucket", &self.storage_bucket)
            .field("freshness_days", &self.freshness_days)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("persist_related", &self.persist_related)
            .field("bulk_result_ttl_secs", &self.bulk_result_ttl_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_ms",
                &self.scraper_retry_backoff_base_ms,
            )
            .finish()
    }
}
