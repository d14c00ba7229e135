//! Queue monitoring routes (admin only).

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use uuid::Uuid;

use taskmail_common::error::AppError;
use taskmail_notifier::monitor::{API_LIST_LIMIT, FailedJobView, PendingJobView, QueueStats};

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/queue/stats", get(stats))
        .route("/api/queue/pending-emails", get(pending_emails))
        .route("/api/queue/failed-emails", get(failed_emails))
        .route("/api/queue/retry/{job_id}", post(retry_job))
        .route("/api/queue/failed-jobs", delete(clear_failed_jobs))
}

/// GET /api/queue/stats: cached counts.
async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<QueueStats>, AppError> {
    let stats = state
        .monitor
        .stats()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read queue stats: {}", e)))?;
    Ok(Json(stats))
}

/// GET /api/queue/pending-emails
async fn pending_emails(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PendingJobView>>, AppError> {
    let jobs = state
        .monitor
        .list_pending(API_LIST_LIMIT)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list pending jobs: {}", e)))?;
    Ok(Json(jobs))
}

/// GET /api/queue/failed-emails
async fn failed_emails(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<FailedJobView>>, AppError> {
    let jobs = state
        .monitor
        .list_failed(API_LIST_LIMIT)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list failed jobs: {}", e)))?;
    Ok(Json(jobs))
}

/// POST /api/queue/retry/{job_id}: any failure, unknown id included, is a 500.
async fn retry_job(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .monitor
        .retry(job_id)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to retry job: {}", e)))?;

    tracing::info!(job_id = %job_id, admin_id = %admin.0.user_id, "Job retry requested");
    Ok(Json(json!({"message": "Job retry initiated successfully"})))
}

/// DELETE /api/queue/failed-jobs
async fn clear_failed_jobs(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let cleared = state
        .monitor
        .clear_failed()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to clear failed jobs: {}", e)))?;

    tracing::info!(cleared, admin_id = %admin.0.user_id, "Failed jobs cleared");
    Ok(Json(json!({
        "message": "All failed jobs cleared successfully",
        "cleared": cleared
    })))
}
