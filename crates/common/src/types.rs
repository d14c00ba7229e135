use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Human-readable label, e.g. "In progress".
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A user in the system.
///
/// `email` may be empty; that is a valid stored state and is only rejected
/// when a notification is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A task owned by (assigned to) a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a notification dispatch or a single delivery attempt.
///
/// Always a value, never an error: callers read it and carry on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl DeliveryResult {
    pub fn sent(at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            error: None,
            sent_at: Some(at),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            sent_at: None,
        }
    }

    /// Result used when no notification was due at all.
    pub fn not_sent() -> Self {
        Self {
            success: false,
            error: None,
            sent_at: None,
        }
    }
}

/// Explicit type tag carried by every queued work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TaskAssigned,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::TaskAssigned => write!(f, "task_assigned"),
        }
    }
}

/// A pending (or currently reserved) queue work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: Uuid,
    pub queue: String,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    /// Number of times a worker has claimed this item.
    pub attempts: i32,
    pub reserved_at: Option<DateTime<Utc>>,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A work item that exhausted its attempts. Kept until retried or flushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FailedJob {
    pub id: Uuid,
    pub queue: String,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub exception: String,
    pub failed_at: DateTime<Utc>,
}
