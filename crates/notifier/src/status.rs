//! Mail configuration snapshot reported to administrators.

use serde::{Deserialize, Serialize};

use taskmail_common::config::AppConfig;

/// The five fixed keys of `GET /email-status`. Every key is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailStatus {
    pub configured: bool,
    pub driver: String,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub queue_enabled: bool,
}

impl EmailStatus {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            configured: config.is_email_configured(),
            driver: config.mail_driver.clone(),
            from_address: config.mail_from_address.clone(),
            from_name: config.mail_from_name.clone(),
            queue_enabled: config.queue_enabled(),
        }
    }
}
