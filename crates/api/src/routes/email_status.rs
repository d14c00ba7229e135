//! Mail configuration status (admin only).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use taskmail_notifier::status::EmailStatus;

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/email-status", get(email_status))
}

/// GET /api/email-status: always the same five keys.
async fn email_status(State(state): State<AppState>, _admin: AdminUser) -> Json<EmailStatus> {
    Json(EmailStatus::from_config(&state.config))
}
