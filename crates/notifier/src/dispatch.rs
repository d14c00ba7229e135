//! Dispatch service: turns a task assignment into a delivery attempt.
//!
//! `dispatch` never fails: every error ends up in the returned
//! [`DeliveryResult`], which callers treat as informational. In queued mode
//! a successful result means "accepted by the queue"; the actual send happens
//! later in a worker. In sync mode the result is the outcome of the one
//! inline attempt.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use taskmail_common::config::{AppConfig, QueueConnection};
use taskmail_common::types::{DeliveryResult, Task, User};

use crate::executor::DeliveryExecutor;
use crate::fallback::FallbackNotifier;
use crate::queue::JobQueue;
use crate::record::NotificationRecord;
use crate::transport::{self, TransportError};

/// Error reported when the recipient has no email address.
pub const MISSING_EMAIL_ERROR: &str = "User does not have a valid email address";

/// How a dispatched record reaches the executor.
pub enum DispatchMode {
    /// Push onto a queue; workers deliver out of band.
    Queued {
        queue: Arc<dyn JobQueue>,
        queue_name: String,
    },
    /// Deliver inline, once, in the calling task.
    Sync { executor: Arc<DeliveryExecutor> },
}

pub struct DispatchService {
    mode: DispatchMode,
    fallback: Arc<dyn FallbackNotifier>,
}

impl DispatchService {
    pub fn new(mode: DispatchMode, fallback: Arc<dyn FallbackNotifier>) -> Self {
        Self { mode, fallback }
    }

    /// Build the service for the configured queue connection.
    ///
    /// `queue` is ignored when `QUEUE_CONNECTION=sync`.
    pub fn from_config(
        config: &AppConfig,
        queue: Arc<dyn JobQueue>,
        fallback: Arc<dyn FallbackNotifier>,
    ) -> Result<Self, TransportError> {
        let mode = match config.queue_connection {
            QueueConnection::Sync => {
                let transport = transport::from_config(config)?;
                DispatchMode::Sync {
                    executor: Arc::new(DeliveryExecutor::new(transport, config.app_url.clone())),
                }
            }
            QueueConnection::Database | QueueConnection::Memory => DispatchMode::Queued {
                queue,
                queue_name: config.queue_name.clone(),
            },
        };
        Ok(Self::new(mode, fallback))
    }

    pub fn queue_enabled(&self) -> bool {
        matches!(self.mode, DispatchMode::Queued { .. })
    }

    /// Notify `recipient` that `task` is now theirs.
    ///
    /// `previous_owner_id` marks a reassignment.
    pub async fn dispatch(
        &self,
        recipient: &User,
        task: &Task,
        previous_owner_id: Option<Uuid>,
    ) -> DeliveryResult {
        let result = if recipient.email.trim().is_empty() {
            DeliveryResult::failed(MISSING_EMAIL_ERROR)
        } else {
            let record = NotificationRecord::new(recipient.clone(), task.clone(), previous_owner_id);
            self.deliver(&record).await
        };

        match &result.error {
            None if result.success => log_success(recipient, task, previous_owner_id),
            error => {
                let error = error.as_deref().unwrap_or("unknown error");
                log_failure(recipient, task, previous_owner_id, error);
                self.run_fallback(recipient, task, error).await;
            }
        }

        result
    }

    async fn deliver(&self, record: &NotificationRecord) -> DeliveryResult {
        match &self.mode {
            DispatchMode::Queued { queue, queue_name } => {
                let payload = match record.to_payload() {
                    Ok(payload) => payload,
                    Err(e) => return DeliveryResult::failed(e.to_string()),
                };
                match queue.push(queue_name, record.kind(), payload).await {
                    Ok(job_id) => {
                        tracing::debug!(
                            job_id = %job_id,
                            task_id = %record.task.id,
                            queue = %queue_name,
                            "Notification queued"
                        );
                        DeliveryResult::sent(Utc::now())
                    }
                    Err(e) => DeliveryResult::failed(e.to_string()),
                }
            }
            DispatchMode::Sync { executor } => executor.attempt(record).await,
        }
    }

    async fn run_fallback(&self, recipient: &User, task: &Task, error: &str) {
        if let Err(fallback_error) = self.fallback.notify_fallback(recipient, task, error).await {
            tracing::error!(
                task_id = %task.id,
                user_id = %recipient.id,
                fallback_error = %fallback_error,
                original_error = %error,
                "Fallback notification also failed"
            );
        }
    }
}

fn log_success(recipient: &User, task: &Task, previous_owner_id: Option<Uuid>) {
    match previous_owner_id {
        Some(previous) => tracing::info!(
            task_id = %task.id,
            user_id = %recipient.id,
            user_email = %recipient.email,
            previous_user_id = %previous,
            "Task reassignment email sent successfully"
        ),
        None => tracing::info!(
            task_id = %task.id,
            user_id = %recipient.id,
            user_email = %recipient.email,
            "Task assignment email sent successfully"
        ),
    }
}

fn log_failure(recipient: &User, task: &Task, previous_owner_id: Option<Uuid>, error: &str) {
    match previous_owner_id {
        Some(previous) => tracing::error!(
            task_id = %task.id,
            user_id = %recipient.id,
            user_email = %recipient.email,
            previous_user_id = %previous,
            error = %error,
            "Failed to send task reassignment email"
        ),
        None => tracing::error!(
            task_id = %task.id,
            user_id = %recipient.id,
            user_email = %recipient.email,
            error = %error,
            "Failed to send task assignment email"
        ),
    }
}
