//! Shared application state for the Axum API server.

use std::sync::Arc;

use sqlx::PgPool;

use taskmail_common::config::AppConfig;
use taskmail_notifier::dispatch::DispatchService;
use taskmail_notifier::monitor::QueueMonitor;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub dispatcher: Arc<DispatchService>,
    pub monitor: Arc<QueueMonitor>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        dispatcher: Arc<DispatchService>,
        monitor: Arc<QueueMonitor>,
    ) -> Self {
        Self {
            pool,
            config,
            dispatcher,
            monitor,
        }
    }
}
