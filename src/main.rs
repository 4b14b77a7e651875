use marketplace_engine::api::{create_router, AppState};
use marketplace_engine::cache::WalletCache;
use marketplace_engine::config::Settings;
use marketplace_engine::observability::{init_logging, init_metrics, HealthChecker, LogConfig, LogFormat};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    // Initialize logging
    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        ..LogConfig::default()
    });
    info!("Configuration loaded");

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    // Connect to Redis; the balance cache is optional, so startup only
    // verifies reachability and logs the outcome.
    info!("Connecting to Redis...");
    let redis_client = redis::Client::open(settings.redis.url.clone())?;
    match redis_client.get_multiplexed_async_connection().await {
        Ok(mut con) => {
            let _: () = redis::cmd("PING").query_async(&mut con).await?;
            info!("Redis connection established");
        }
        Err(e) => {
            tracing::warn!("Redis unreachable at startup, cache degraded: {}", e);
        }
    }

    // Metrics
    let metrics_handle = init_metrics();

    let cache = Arc::new(WalletCache::new(
        redis_client.clone(),
        settings.cache.clone(),
    ));
    let health_checker = Arc::new(HealthChecker::new(pool.clone(), redis_client.clone()));

    let state = AppState::new(pool, redis_client, settings.platform.clone())
        .with_cache(cache)
        .with_metrics(metrics_handle)
        .with_health_checker(health_checker);

    let router = create_router(state);

    let addr = format!("0.0.0.0:{}", settings.application.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
