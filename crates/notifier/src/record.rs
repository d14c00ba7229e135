//! Notification record: "task T was assigned to user U".
//!
//! Built once per dispatch and never stored directly: it travels inside a
//! queue work item payload and is rendered into a [`MailMessage`] by the
//! executor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskmail_common::types::{JobKind, Task, User};

use crate::message::{MailAction, MailMessage};

/// Display format for deadlines, e.g. "March 5, 2025 4:30 PM".
const DEADLINE_FORMAT: &str = "%B %-d, %Y %-I:%M %p";

/// Immutable description of one task assignment to notify about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub recipient: User,
    pub task: Task,
    /// Set when the task moved from another user.
    pub previous_owner_id: Option<Uuid>,
}

impl NotificationRecord {
    pub fn new(recipient: User, task: Task, previous_owner_id: Option<Uuid>) -> Self {
        Self {
            recipient,
            task,
            previous_owner_id,
        }
    }

    /// Queue tag for work items carrying this record.
    pub fn kind(&self) -> JobKind {
        JobKind::TaskAssigned
    }

    pub fn is_reassignment(&self) -> bool {
        self.previous_owner_id.is_some()
    }

    /// Render the assignment email. `app_url` is the public base URL.
    pub fn to_mail(&self, app_url: &str) -> MailMessage {
        let task = &self.task;

        let mut intro = vec![
            "A new task has been assigned to you.".to_string(),
            format!("Task: {}", task.title),
            format!("Description: {}", task.description),
            format!("Status: {}", task.status.label()),
        ];
        if let Some(deadline) = task.deadline {
            intro.push(format!("Deadline: {}", deadline.format(DEADLINE_FORMAT)));
        }

        MailMessage {
            to_address: self.recipient.email.clone(),
            to_name: self.recipient.name.clone(),
            subject: format!("New Task Assigned: {}", task.title),
            greeting: format!("Hello {}!", self.recipient.name),
            intro,
            action: Some(MailAction {
                label: "View Task".to_string(),
                url: format!("{}/dashboard", app_url.trim_end_matches('/')),
            }),
            outro: vec![
                "Please log in to your dashboard to view and update this task.".to_string(),
            ],
        }
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }
}
