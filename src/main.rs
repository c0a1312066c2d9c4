use bubble_tea_shop::activity_log::LogAttivitaRepository;
use bubble_tea_shop::config::AppConfig;
use bubble_tea_shop::db;
use bubble_tea_shop::error::RepositoryError;
use tracing_subscriber::EnvFilter;

/// Maintenance run: prepares the database and applies log retention.
#[tokio::main]
async fn main() -> Result<(), RepositoryError> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Bubble tea shop maintenance - Starting...");

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool).await?;
    tracing::info!("Schema and seed states ready");

    let purged = LogAttivitaRepository::new(pool.clone())
        .purge_with_retention(&config)
        .await?;
    tracing::info!("{}", purged.message);

    pool.close().await;
    Ok(())
}
