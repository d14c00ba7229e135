//! Fallback path, invoked after primary delivery fails.
//!
//! The dispatch service treats the fallback as best effort: its result never
//! changes the `DeliveryResult` handed back to the caller.

use async_trait::async_trait;

use taskmail_common::types::{Task, User};

/// A secondary notification channel (SMS, webhook, push, ...).
#[async_trait]
pub trait FallbackNotifier: Send + Sync {
    async fn notify_fallback(&self, recipient: &User, task: &Task, error: &str)
    -> anyhow::Result<()>;
}

/// Default fallback: records the attempt in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFallback;

#[async_trait]
impl FallbackNotifier for LogFallback {
    async fn notify_fallback(
        &self,
        recipient: &User,
        task: &Task,
        error: &str,
    ) -> anyhow::Result<()> {
        tracing::warn!(
            task_id = %task.id,
            user_id = %recipient.id,
            original_error = %error,
            "Attempting fallback notification method"
        );

        tracing::info!(
            task_id = %task.id,
            user_id = %recipient.id,
            method = "log_only",
            "Fallback notification method attempted"
        );

        Ok(())
    }
}
