//! Delivery attempt executor: one send of one notification record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use taskmail_common::types::DeliveryResult;

use crate::policy::ATTEMPT_TIMEOUT_SECS;
use crate::record::NotificationRecord;
use crate::transport::{MailTransport, TransportError};

/// Renders a record and performs a single, time-boxed transport send.
///
/// Not idempotent: a retried attempt can deliver the same email twice.
pub struct DeliveryExecutor {
    transport: Arc<dyn MailTransport>,
    app_url: String,
    timeout: Duration,
}

impl DeliveryExecutor {
    pub fn new(transport: Arc<dyn MailTransport>, app_url: impl Into<String>) -> Self {
        Self {
            transport,
            app_url: app_url.into(),
            timeout: Duration::from_secs(ATTEMPT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn driver(&self) -> &str {
        self.transport.driver()
    }

    /// Attempt delivery. Transport failures and timeouts become a failed
    /// result carrying the transport's message.
    pub async fn attempt(&self, record: &NotificationRecord) -> DeliveryResult {
        let message = record.to_mail(&self.app_url);

        let outcome = match tokio::time::timeout(self.timeout, self.transport.send(&message)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(()) => DeliveryResult::sent(Utc::now()),
            Err(e) => {
                tracing::debug!(
                    task_id = %record.task.id,
                    user_email = %record.recipient.email,
                    error = %e,
                    "Delivery attempt failed"
                );
                DeliveryResult::failed(e.to_string())
            }
        }
    }
}
