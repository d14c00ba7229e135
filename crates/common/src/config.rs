use serde::Deserialize;

/// Queue driver that backs deferred notification delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueConnection {
    /// Durable Postgres `jobs` / `failed_jobs` tables, drained by `taskmail-worker`.
    Database,
    /// In-process queue drained by a worker task spawned inside the API server.
    Memory,
    /// No queue: dispatch performs the delivery attempt inline.
    Sync,
}

impl QueueConnection {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "database" => Ok(Self::Database),
            "memory" => Ok(Self::Memory),
            "sync" => Ok(Self::Sync),
            other => Err(anyhow::anyhow!(
                "QUEUE_CONNECTION must be one of database, memory, sync (got '{}')",
                other
            )),
        }
    }
}

impl std::fmt::Display for QueueConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueConnection::Database => write!(f, "database"),
            QueueConnection::Memory => write!(f, "memory"),
            QueueConnection::Sync => write!(f, "sync"),
        }
    }
}

/// Transport security for the `smtp` mail driver (`MAIL_ENCRYPTION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailEncryption {
    /// Plain connection upgraded with STARTTLS (`tls`, usually port 587).
    StartTls,
    /// Implicit TLS from the first byte (`ssl`, usually port 465).
    Tls,
    /// Unencrypted, for local catch-all servers.
    None,
}

impl MailEncryption {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" | "starttls" => Ok(Self::StartTls),
            "ssl" => Ok(Self::Tls),
            "" | "none" | "null" => Ok(Self::None),
            other => Err(anyhow::anyhow!(
                "MAIL_ENCRYPTION must be one of tls, ssl, none (got '{}')",
                other
            )),
        }
    }
}

/// Settings of the `smtp` mail driver.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub encryption: MailEncryption,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            encryption: MailEncryption::StartTls,
        }
    }
}

impl SmtpConfig {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: non_empty_var("MAIL_HOST"),
            port: std::env::var("MAIL_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAIL_PORT must be a valid u16"))?,
            username: non_empty_var("MAIL_USERNAME"),
            password: non_empty_var("MAIL_PASSWORD"),
            encryption: MailEncryption::parse(
                &std::env::var("MAIL_ENCRYPTION").unwrap_or_else(|_| "tls".to_string()),
            )?,
        })
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (queue stats cache)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Port the API server binds to
    pub api_port: u16,

    /// Public base URL, used for links in outgoing mail
    pub app_url: String,

    /// Mail transport driver (`smtp`, `resend` or `log`)
    pub mail_driver: String,

    /// SMTP server settings, used by the `smtp` driver
    pub smtp: SmtpConfig,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Sender address
    pub mail_from_address: Option<String>,

    /// Sender display name
    pub mail_from_name: Option<String>,

    /// Queue driver selection
    pub queue_connection: QueueConnection,

    /// Name of the queue notification work items are pushed onto
    pub queue_name: String,

    /// Idle sleep between empty queue polls, in milliseconds
    pub worker_poll_interval_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("JWT_EXPIRY_HOURS must be a valid u64"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            app_url: std::env::var("APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mail_driver: std::env::var("MAIL_MAILER").unwrap_or_else(|_| "log".to_string()),
            smtp: SmtpConfig::from_env()?,
            resend_api_key: non_empty_var("RESEND_API_KEY"),
            mail_from_address: non_empty_var("MAIL_FROM_ADDRESS"),
            mail_from_name: non_empty_var("MAIL_FROM_NAME"),
            queue_connection: QueueConnection::parse(
                &std::env::var("QUEUE_CONNECTION").unwrap_or_else(|_| "database".to_string()),
            )?,
            queue_name: std::env::var("QUEUE_NAME").unwrap_or_else(|_| "default".to_string()),
            worker_poll_interval_ms: std::env::var("WORKER_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_POLL_INTERVAL_MS must be a valid u64"))?,
        })
    }

    /// Whether the mail transport has everything it needs to send.
    ///
    /// `smtp` needs a host and a username, `resend` an API key and a sender
    /// address. Unknown drivers are never configured.
    pub fn is_email_configured(&self) -> bool {
        match self.mail_driver.trim() {
            "smtp" => self.smtp.host.is_some() && self.smtp.username.is_some(),
            "resend" => self.resend_api_key.is_some() && self.mail_from_address.is_some(),
            "log" => true,
            _ => false,
        }
    }

    /// `false` only when dispatch runs inline (`QUEUE_CONNECTION=sync`).
    pub fn queue_enabled(&self) -> bool {
        self.queue_connection != QueueConnection::Sync
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
