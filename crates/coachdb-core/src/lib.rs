//! Domain types and configuration shared by every coachdb crate.

pub mod app_config;
pub mod config;
pub mod niche;
pub mod profile;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, ProviderKind};
pub use config::{load_app_config, load_app_config_from_env};
pub use niche::Niche;
pub use profile::{normalize_username, Profile, SnapshotProgress, SnapshotStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
