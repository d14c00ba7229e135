//! Task mutation routes.
//!
//! Create and reassignment responses carry the email outcome inline
//! (`email_sent`, `email_sent_at`, `email_error`). Email failure never fails
//! the request.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, post};
use axum::{Json, Router, middleware};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use taskmail_common::error::AppError;
use taskmail_common::types::DeliveryResult;
use taskmail_tasks::task::{
    CreateTaskParams, TaskService, TaskUpdate, TaskWithOwner, UpdateTaskParams,
};

use crate::middleware::auth::{AdminUser, AuthUser};
use crate::middleware::email_warning::email_failure_warning;
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/tasks", post(create_task))
        .route(
            "/api/tasks/{id}",
            patch(update_task).put(update_task).delete(delete_task),
        )
        .layer(middleware::from_fn_with_state(state, email_failure_warning))
}

/// A task mutation result with the notification outcome.
#[derive(Debug, Serialize)]
pub struct TaskMutationResponse {
    #[serde(flatten)]
    pub task: TaskWithOwner,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_error: Option<String>,
}

impl TaskMutationResponse {
    pub fn new(task: TaskWithOwner, email: DeliveryResult) -> Self {
        Self {
            task,
            email_sent: email.success,
            email_sent_at: email.sent_at,
            email_error: if email.success { None } else { email.error },
        }
    }
}

/// POST /api/tasks: admin only; notifies the new owner.
async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateTaskParams>,
) -> Result<(StatusCode, Json<TaskMutationResponse>), AppError> {
    let created = TaskService::create(&state.pool, auth.actor(), &params).await?;
    let email = state
        .dispatcher
        .dispatch(&created.user, &created.task, None)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(TaskMutationResponse::new(created, email)),
    ))
}

/// PUT/PATCH /api/tasks/{id}
///
/// The owner may only move the status; that response is the plain task.
/// Admin edits report the email outcome, which is `email_sent: false` with no
/// error when the owner did not change.
async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateTaskParams>,
) -> Result<Response, AppError> {
    match TaskService::update(&state.pool, auth.actor(), id, &params).await? {
        TaskUpdate::Status(task) => {
            let task = TaskService::with_owner(&state.pool, task).await?;
            Ok(Json(task).into_response())
        }
        TaskUpdate::Details {
            task,
            reassigned_from,
        } => {
            let task = TaskService::with_owner(&state.pool, task).await?;
            let email = match reassigned_from {
                Some(previous) => {
                    state
                        .dispatcher
                        .dispatch(&task.user, &task.task, Some(previous))
                        .await
                }
                None => DeliveryResult::not_sent(),
            };
            Ok(Json(TaskMutationResponse::new(task, email)).into_response())
        }
    }
}

/// DELETE /api/tasks/{id}: admin only.
async fn delete_task(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if TaskService::delete(&state.pool, id).await? {
        Ok(Json(json!({"message": "Task deleted successfully"})))
    } else {
        Err(AppError::NotFound(format!("Task {} not found", id)))
    }
}
