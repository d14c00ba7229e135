use std::sync::Arc;
use std::time::Duration;

use taskmail_common::config::{AppConfig, QueueConnection};
use taskmail_common::db;
use taskmail_notifier::executor::DeliveryExecutor;
use taskmail_notifier::queue::PgJobQueue;
use taskmail_notifier::transport;
use taskmail_notifier::worker::QueueWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskmail_notifier=info".into()),
        )
        .json()
        .init();

    tracing::info!("Taskmail queue worker starting...");

    let config = AppConfig::from_env()?;
    if config.queue_connection != QueueConnection::Database {
        anyhow::bail!(
            "taskmail-worker drains the database queue, but QUEUE_CONNECTION={}",
            config.queue_connection
        );
    }

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let transport = transport::from_config(&config)?;
    let executor = Arc::new(DeliveryExecutor::new(transport, config.app_url.clone()));
    let worker = QueueWorker::new(
        Arc::new(PgJobQueue::new(pool)),
        executor,
        config.queue_name.clone(),
        Duration::from_millis(config.worker_poll_interval_ms),
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = worker.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Queue worker exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Taskmail queue worker stopped.");
    Ok(())
}
