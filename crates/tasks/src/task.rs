//! Task service: create and update tasks under the ownership rules.
//!
//! Only administrators create tasks, and new tasks always start `pending`.
//! On update, the assigned user may change the status and nothing else, while
//! administrators may change everything except the status. Notification
//! dispatch is the caller's business: this module only reports whether the
//! owner changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use taskmail_common::error::AppError;
use taskmail_common::types::{Task, TaskStatus, User};

use crate::user::UserService;

const MAX_TITLE_LEN: usize = 255;

/// Service layer for task mutations.
pub struct TaskService;

/// The user performing a task mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// Parameters for creating a new task. Status is not accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskParams {
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
    pub deadline: Option<DateTime<Utc>>,
}

/// Parameters for updating an existing task.
///
/// `deadline` distinguishes "absent" (`None`) from "explicitly null"
/// (`Some(None)`), which clears the deadline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub status: Option<TaskStatus>,
}

/// Which part of a task an actor is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Assigned (non-admin) user: status only.
    Status,
    /// Administrator: everything except status.
    Details,
}

/// Result of an update, telling the caller whether a reassignment happened.
#[derive(Debug, Clone)]
pub enum TaskUpdate {
    Status(Task),
    Details {
        task: Task,
        /// Previous owner, set only when `user_id` actually changed.
        reassigned_from: Option<Uuid>,
    },
}

/// A task with its owner embedded, the shape returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWithOwner {
    #[serde(flatten)]
    pub task: Task,
    pub user: User,
}

impl UpdateTaskParams {
    /// Decide what `actor` may change on a task owned by `owner_id`.
    pub fn authorize(&self, actor: Actor, owner_id: Uuid) -> Result<UpdateScope, AppError> {
        let is_owner = actor.user_id == owner_id;

        if !actor.is_admin && !is_owner {
            return Err(AppError::unauthorized());
        }
        if actor.is_admin && self.status.is_some() {
            return Err(AppError::Forbidden(
                "Admins cannot update task status".to_string(),
            ));
        }
        if actor.is_admin {
            Ok(UpdateScope::Details)
        } else {
            Ok(UpdateScope::Status)
        }
    }

    fn validate_details(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description
            && description.trim().is_empty()
        {
            return Err(AppError::Validation(
                "The description field is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl CreateTaskParams {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(&self.title)?;
        if self.description.trim().is_empty() {
            return Err(AppError::Validation(
                "The description field is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation(
            "The title field is required".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "The title may not be greater than {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TaskService {
    /// Create a new task. Only administrators may call this.
    pub async fn create(
        pool: &PgPool,
        actor: Actor,
        params: &CreateTaskParams,
    ) -> Result<TaskWithOwner, AppError> {
        if !actor.is_admin {
            return Err(AppError::unauthorized());
        }
        params.validate()?;
        let owner = UserService::get_referenced(pool, params.user_id).await?;
        let task = Self::insert(pool, params).await?;

        tracing::info!(
            task_id = %task.id,
            user_id = %task.user_id,
            created_by = %actor.user_id,
            "Task created"
        );

        Ok(TaskWithOwner { task, user: owner })
    }

    /// Insert a `pending` task without the admin check.
    ///
    /// Callers outside the request path (the operator CLI) use this directly.
    pub async fn insert(pool: &PgPool, params: &CreateTaskParams) -> Result<Task, AppError> {
        let task: Task = sqlx::query_as(
            r#"
            INSERT INTO tasks (id, title, description, status, deadline, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&params.title)
        .bind(&params.description)
        .bind(TaskStatus::Pending.to_string())
        .bind(params.deadline)
        .bind(params.user_id)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Get a single task by ID.
    pub async fn get(pool: &PgPool, task_id: Uuid) -> Result<Task, AppError> {
        let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;

        Ok(task)
    }

    /// Attach the owner to a task.
    pub async fn with_owner(pool: &PgPool, task: Task) -> Result<TaskWithOwner, AppError> {
        let user = UserService::get(pool, task.user_id).await?;
        Ok(TaskWithOwner { task, user })
    }

    /// Update a task within the scope `actor` is allowed.
    pub async fn update(
        pool: &PgPool,
        actor: Actor,
        task_id: Uuid,
        params: &UpdateTaskParams,
    ) -> Result<TaskUpdate, AppError> {
        let existing = Self::get(pool, task_id).await?;

        match params.authorize(actor, existing.user_id)? {
            UpdateScope::Status => {
                let status = params
                    .status
                    .ok_or_else(|| AppError::Validation("The status field is required".to_string()))?;
                let task = Self::set_status(pool, task_id, status).await?;
                Ok(TaskUpdate::Status(task))
            }
            UpdateScope::Details => {
                params.validate_details()?;
                if let Some(user_id) = params.user_id {
                    UserService::get_referenced(pool, user_id).await?;
                }

                let title = params.title.clone().unwrap_or(existing.title);
                let description = params.description.clone().unwrap_or(existing.description);
                let user_id = params.user_id.unwrap_or(existing.user_id);
                let deadline = params.deadline.unwrap_or(existing.deadline);

                let task: Task = sqlx::query_as(
                    r#"
                    UPDATE tasks
                    SET title = $1, description = $2, user_id = $3, deadline = $4, updated_at = NOW()
                    WHERE id = $5
                    RETURNING *
                    "#,
                )
                .bind(&title)
                .bind(&description)
                .bind(user_id)
                .bind(deadline)
                .bind(task_id)
                .fetch_one(pool)
                .await?;

                let reassigned_from =
                    (task.user_id != existing.user_id).then_some(existing.user_id);

                tracing::info!(
                    task_id = %task_id,
                    reassigned = reassigned_from.is_some(),
                    "Task updated"
                );

                Ok(TaskUpdate::Details {
                    task,
                    reassigned_from,
                })
            }
        }
    }

    async fn set_status(
        pool: &PgPool,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<Task, AppError> {
        let task: Task = sqlx::query_as(
            "UPDATE tasks SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status.to_string())
        .bind(task_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(task_id = %task_id, status = %status, "Task status updated");
        Ok(task)
    }

    /// Delete a task. Returns true if it was deleted.
    pub async fn delete(pool: &PgPool, task_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            is_admin: true,
        }
    }

    fn member(id: Uuid) -> Actor {
        Actor {
            user_id: id,
            is_admin: false,
        }
    }

    #[test]
    fn test_stranger_cannot_update() {
        let params = UpdateTaskParams {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let result = params.authorize(member(Uuid::new_v4()), Uuid::new_v4());
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_admin_cannot_touch_status() {
        let params = UpdateTaskParams {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        match params.authorize(admin(), Uuid::new_v4()) {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Admins cannot update task status"),
            other => panic!("expected forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_owner_gets_status_scope() {
        let owner = Uuid::new_v4();
        let params = UpdateTaskParams {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        };
        assert_eq!(
            params.authorize(member(owner), owner).unwrap(),
            UpdateScope::Status
        );
    }

    #[test]
    fn test_admin_owner_gets_details_scope() {
        let actor = admin();
        let params = UpdateTaskParams {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert_eq!(
            params.authorize(actor, actor.user_id).unwrap(),
            UpdateScope::Details
        );
    }

    #[test]
    fn test_create_validation() {
        let mut params = CreateTaskParams {
            title: "Write report".to_string(),
            description: "Quarterly numbers".to_string(),
            user_id: Uuid::new_v4(),
            deadline: None,
        };
        assert!(params.validate().is_ok());

        params.title = "x".repeat(256);
        assert!(matches!(params.validate(), Err(AppError::Validation(_))));

        params.title = "ok".to_string();
        params.description = "   ".to_string();
        assert!(matches!(params.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_deadline_absent_vs_null() {
        let absent: UpdateTaskParams = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert_eq!(absent.deadline, None);

        let cleared: UpdateTaskParams = serde_json::from_str(r#"{"deadline":null}"#).unwrap();
        assert_eq!(cleared.deadline, Some(None));

        let set: UpdateTaskParams =
            serde_json::from_str(r#"{"deadline":"2030-01-02T03:04:05Z"}"#).unwrap();
        assert!(matches!(set.deadline, Some(Some(_))));
    }
}
