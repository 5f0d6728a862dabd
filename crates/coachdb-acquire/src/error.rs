use coachdb_scraper::ScraperError;
use thiserror::Error;

/// Failure of a persistence operation behind [`crate::ProfileStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] coachdb_db::DbError),

    #[error("store error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rate limited by {provider}; wait {retry_after_secs}s and try again")]
    RateLimited {
        provider: &'static str,
        retry_after_secs: u64,
    },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider \"{0}\" does not support batch jobs")]
    BatchUnsupported(&'static str),
}

impl From<ScraperError> for AcquireError {
    fn from(err: ScraperError) -> Self {
        match err {
            ScraperError::RateLimited {
                provider,
                retry_after_secs,
            } => AcquireError::RateLimited {
                provider,
                retry_after_secs,
            },
            ScraperError::MalformedResponse { .. } | ScraperError::Deserialize { .. } => {
                AcquireError::Malformed(err.to_string())
            }
            other => AcquireError::Provider(other.to_string()),
        }
    }
}
