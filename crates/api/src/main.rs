//! Taskmail API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use taskmail_common::config::{AppConfig, QueueConnection};
use taskmail_common::db::{create_pool, run_migrations};
use taskmail_common::redis_pool::create_redis_pool;
use taskmail_notifier::cache::{LocalStatsCache, RedisStatsCache, StatsCache};
use taskmail_notifier::dispatch::DispatchService;
use taskmail_notifier::executor::DeliveryExecutor;
use taskmail_notifier::fallback::LogFallback;
use taskmail_notifier::monitor::QueueMonitor;
use taskmail_notifier::queue::{JobQueue, MemoryJobQueue, PgJobQueue};
use taskmail_notifier::transport;
use taskmail_notifier::worker::QueueWorker;

use taskmail_api::routes::create_router;
use taskmail_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("taskmail_api=debug,taskmail_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Taskmail API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database pool created");

    let (queue, cache): (Arc<dyn JobQueue>, Arc<dyn StatsCache>) = match config.queue_connection {
        QueueConnection::Memory => {
            let queue = Arc::new(MemoryJobQueue::new());
            spawn_in_process_worker(&config, queue.clone())?;
            (
                queue as Arc<dyn JobQueue>,
                Arc::new(LocalStatsCache::new()) as Arc<dyn StatsCache>,
            )
        }
        QueueConnection::Database | QueueConnection::Sync => {
            let redis = create_redis_pool(&config.redis_url).await?;
            tracing::info!("Redis connection established");
            (
                Arc::new(PgJobQueue::new(pool.clone())) as Arc<dyn JobQueue>,
                Arc::new(RedisStatsCache::new(redis)) as Arc<dyn StatsCache>,
            )
        }
    };

    let dispatcher = DispatchService::from_config(&config, queue.clone(), Arc::new(LogFallback))?;
    tracing::info!(
        queue_connection = %config.queue_connection,
        mail_driver = %config.mail_driver,
        "Notification dispatch configured"
    );
    let monitor = QueueMonitor::new(queue, cache);

    // Build application state
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let state = AppState::new(pool, config, Arc::new(dispatcher), Arc::new(monitor));

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    Ok(())
}

/// With `QUEUE_CONNECTION=memory` nothing else can see the queue, so the
/// worker runs inside this process.
fn spawn_in_process_worker(config: &AppConfig, queue: Arc<MemoryJobQueue>) -> anyhow::Result<()> {
    let transport = transport::from_config(config)?;
    let executor = Arc::new(DeliveryExecutor::new(transport, config.app_url.clone()));
    let worker = QueueWorker::new(
        queue,
        executor,
        config.queue_name.clone(),
        Duration::from_millis(config.worker_poll_interval_ms),
    );

    tokio::spawn(async move {
        if let Err(e) = worker.run().await {
            tracing::error!(error = %e, "In-process queue worker exited");
        }
    });
    Ok(())
}
