//! Mail transports.
//!
//! `smtp` relays through an SMTP server, `resend` delivers through the Resend
//! HTTP API and `log` writes the rendered message to the tracing output.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde_json::json;
use thiserror::Error;

use taskmail_common::config::{AppConfig, MailEncryption, SmtpConfig};

use crate::message::MailMessage;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Failure of a single send. The `Display` text is what callers see as the
/// delivery error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Mail transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Invalid mail message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("Mail provider rejected the message (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Delivery attempt timed out after {0}s")]
    Timeout(u64),

    #[error("Mail transport not configured: {0}")]
    NotConfigured(String),
}

/// An external mail delivery mechanism.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Driver name as reported by the email status endpoint.
    fn driver(&self) -> &str;

    async fn send(&self, message: &MailMessage) -> Result<(), TransportError>;
}

/// Build the transport selected by `MAIL_MAILER`.
///
/// Succeeds exactly when [`AppConfig::is_email_configured`] holds.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn MailTransport>, TransportError> {
    match config.mail_driver.trim() {
        "smtp" => Ok(Arc::new(SmtpMailTransport::from_config(
            &config.smtp,
            config.mail_from_address.as_deref(),
            config.mail_from_name.clone(),
        )?)),
        "resend" => {
            let api_key = config.resend_api_key.clone().ok_or_else(|| {
                TransportError::NotConfigured("RESEND_API_KEY is not set".to_string())
            })?;
            let from_address = config.mail_from_address.clone().ok_or_else(|| {
                TransportError::NotConfigured("MAIL_FROM_ADDRESS is not set".to_string())
            })?;
            Ok(Arc::new(ResendTransport::new(
                api_key,
                from_address,
                config.mail_from_name.clone(),
            )))
        }
        "log" => Ok(Arc::new(LogTransport)),
        other => Err(TransportError::NotConfigured(format!(
            "unsupported mail driver '{}'",
            other
        ))),
    }
}

/// SMTP relay transport.
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    /// The sender defaults to the SMTP username when no from-address is set.
    pub fn from_config(
        smtp: &SmtpConfig,
        from_address: Option<&str>,
        from_name: Option<String>,
    ) -> Result<Self, TransportError> {
        let host = smtp
            .host
            .as_deref()
            .ok_or_else(|| TransportError::NotConfigured("MAIL_HOST is not set".to_string()))?;
        let username = smtp
            .username
            .clone()
            .ok_or_else(|| TransportError::NotConfigured("MAIL_USERNAME is not set".to_string()))?;

        let from_address: Address = from_address.unwrap_or(&username).parse()?;
        let builder = match smtp.encryption {
            MailEncryption::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            MailEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            MailEncryption::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let password = smtp.password.clone().unwrap_or_default();
        let mailer = builder
            .port(smtp.port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self {
            mailer,
            from: Mailbox::new(from_name, from_address),
        })
    }

    fn build_message(&self, message: &MailMessage) -> Result<Message, TransportError> {
        let name = Some(message.to_name.trim().to_string()).filter(|n| !n.is_empty());
        let to = Mailbox::new(name, message.to_address.parse()?);
        Ok(Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.text_body())?)
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn driver(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        let email = self.build_message(message)?;
        let response = self.mailer.send(email).await?;
        tracing::debug!(
            to = %message.to_address,
            code = %response.code(),
            "Message accepted by SMTP server"
        );
        Ok(())
    }
}

/// Resend HTTP API transport.
pub struct ResendTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ResendTransport {
    pub fn new(api_key: String, from_address: String, from_name: Option<String>) -> Self {
        let from = match from_name {
            Some(name) => format!("{} <{}>", name, from_address),
            None => from_address,
        };
        Self {
            client: reqwest::Client::new(),
            endpoint: RESEND_ENDPOINT.to_string(),
            api_key,
            from,
        }
    }

    fn request_body(&self, message: &MailMessage) -> serde_json::Value {
        json!({
            "from": self.from,
            "to": [message.recipient()],
            "subject": message.subject,
            "text": message.text_body(),
        })
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    fn driver(&self) -> &str {
        "resend"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %message.to_address, "Message accepted by Resend");
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    fn driver(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), TransportError> {
        tracing::info!(
            to = %message.recipient(),
            subject = %message.subject,
            body = %message.text_body(),
            "Mail message logged"
        );
        Ok(())
    }
}
