//! Taskmail operator CLI.

mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskmail_common::config::{AppConfig, QueueConnection};
use taskmail_common::db::create_pool;
use taskmail_notifier::cache::LocalStatsCache;
use taskmail_notifier::monitor::QueueMonitor;
use taskmail_notifier::queue::{JobQueue, PgJobQueue};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url, 2).await?;

    match cli.command {
        Commands::EmailTest { user_id, dry_run } => {
            let queue = database_queue(&config, &pool)?;
            commands::email_test::run(&config, &pool, queue, user_id, dry_run).await
        }
        Commands::QueueEmails {
            failed,
            pending,
            stats,
        } => {
            let queue = database_queue(&config, &pool)?;
            let monitor = QueueMonitor::new(queue, Arc::new(LocalStatsCache::new()));
            let sections = commands::queue_emails::sections(failed, pending, stats);
            commands::queue_emails::run(&monitor, &sections).await
        }
        Commands::IssueToken { user_id } => {
            commands::issue_token::run(&config, &pool, user_id).await
        }
    }
}

/// The in-memory queue lives inside the API process and cannot be reached
/// from here.
fn database_queue(config: &AppConfig, pool: &sqlx::PgPool) -> anyhow::Result<Arc<dyn JobQueue>> {
    if config.queue_connection == QueueConnection::Memory {
        anyhow::bail!("QUEUE_CONNECTION=memory: the queue is only visible inside taskmail-api");
    }
    Ok(Arc::new(PgJobQueue::new(pool.clone())))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}
