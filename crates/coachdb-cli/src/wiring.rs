use std::sync::Arc;

use coachdb_acquire::{
    AcquireSettings, MemoryProfileStore, Orchestrator, PgProfileStore, ProfileStore,
};
use coachdb_core::{AppConfig, ProviderKind};
use coachdb_scraper::{
    BrightDataClient, ClientSettings, HasDataClient, ImageRelocator, ProfileProvider,
    SupabaseStorage,
};

pub(crate) fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn ProfileProvider>> {
    let settings = ClientSettings::from_app_config(config);
    match config.provider {
        ProviderKind::BrightData => {
            let api_key = config
                .bright_data_api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("BRIGHT_DATA_API_KEY is not set"))?;
            let client =
                BrightDataClient::new(api_key, &config.bright_data_dataset_id, &settings)?;
            Ok(Arc::new(client))
        }
        ProviderKind::HasData => {
            let api_key = config
                .hasdata_api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("HASDATA_API_KEY is not set"))?;
            Ok(Arc::new(HasDataClient::new(api_key, &settings)?))
        }
    }
}

pub(crate) fn build_relocator(config: &AppConfig) -> anyhow::Result<ImageRelocator> {
    let (Some(base_url), Some(service_key)) = (
        config.supabase_url.as_deref(),
        config.supabase_service_key.as_deref(),
    ) else {
        tracing::debug!("supabase storage not configured; keeping remote picture urls");
        return Ok(ImageRelocator::disabled());
    };
    let settings = ClientSettings::from_app_config(config);
    let storage = SupabaseStorage::new(base_url, service_key, &config.storage_bucket, &settings)?;
    Ok(ImageRelocator::new(Arc::new(storage)))
}

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let database_url = config.require_database_url()?;
    let pool_config = coachdb_db::PoolConfig::from_app_config(config);
    let pool = coachdb_db::connect_pool(database_url, pool_config).await?;
    Ok(pool)
}

pub(crate) async fn build_store(
    config: &AppConfig,
    dry_run: bool,
) -> anyhow::Result<Arc<dyn ProfileStore>> {
    if dry_run {
        tracing::info!("dry run: using an in-memory profile store");
        return Ok(Arc::new(MemoryProfileStore::new()));
    }
    let pool = connect(config).await?;
    coachdb_db::run_migrations(&pool).await?;
    Ok(Arc::new(PgProfileStore::new(pool)))
}

pub(crate) async fn build_orchestrator(
    config: &AppConfig,
    dry_run: bool,
) -> anyhow::Result<Orchestrator> {
    let store = build_store(config, dry_run).await?;
    let provider = build_provider(config)?;
    let relocator = build_relocator(config)?;
    tracing::info!(
        provider = provider.name(),
        relocation = relocator.is_enabled(),
        "orchestrator ready"
    );
    Ok(Orchestrator::new(
        store,
        provider,
        relocator,
        AcquireSettings::from_app_config(config),
    ))
}

pub(crate) async fn run_db_ping(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    coachdb_db::health_check(&pool).await?;
    println!("database ok");
    Ok(())
}

pub(crate) async fn run_db_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    coachdb_db::run_migrations(&pool).await?;
    println!("migrations applied");
    Ok(())
}
