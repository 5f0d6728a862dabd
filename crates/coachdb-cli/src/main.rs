mod acquire;
mod wiring;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "coachdb-cli")]
#[command(about = "Acquire and cache Instagram coach profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Acquire one profile, from the cache when fresh.
    Fetch {
        username: String,
        /// Use an in-memory store instead of Postgres.
        #[arg(long)]
        dry_run: bool,
    },
    /// Acquire several profiles sequentially.
    FetchMany {
        #[arg(required = true)]
        usernames: Vec<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Provider batch jobs.
    Bulk {
        #[command(subcommand)]
        command: BulkCommands,
    },
    /// Count stored profiles.
    Stats {
        #[arg(long)]
        niche: Option<String>,
        #[arg(long)]
        include_partial: bool,
    },
    /// Delete a stored profile by id.
    Delete { id: String },
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum BulkCommands {
    /// Start a job for profile URLs that are not freshly cached.
    Trigger {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Check a job once; returns its profiles when ready.
    Poll { job_handle: String },
    /// Poll a job until it is ready or failed.
    Wait {
        job_handle: String,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        #[arg(long, default_value_t = 120)]
        max_polls: u32,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = coachdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch { username, dry_run } => {
            acquire::run_fetch(&config, &username, dry_run).await
        }
        Commands::FetchMany { usernames, dry_run } => {
            acquire::run_fetch_many(&config, &usernames, dry_run).await
        }
        Commands::Bulk { command } => match command {
            BulkCommands::Trigger { urls } => acquire::run_bulk_trigger(&config, &urls).await,
            BulkCommands::Poll { job_handle } => {
                acquire::run_bulk_poll(&config, &job_handle).await
            }
            BulkCommands::Wait {
                job_handle,
                interval_secs,
                max_polls,
            } => acquire::run_bulk_wait(&config, &job_handle, interval_secs, max_polls).await,
        },
        Commands::Stats {
            niche,
            include_partial,
        } => acquire::run_stats(&config, niche.as_deref(), include_partial).await,
        Commands::Delete { id } => acquire::run_delete(&config, &id).await,
        Commands::Db { command } => match command {
            DbCommands::Ping => wiring::run_db_ping(&config).await,
            DbCommands::Migrate => wiring::run_db_migrate(&config).await,
        },
    }
}
