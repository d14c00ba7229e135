//! Flags responses whose email notification failed.
//!
//! Task mutations report the email outcome inline. When a 200/201 JSON body
//! says `email_sent: false` with an `email_error`, this layer logs a warning
//! with the request context and adds an advisory header. Status and body pass
//! through untouched.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;

use crate::middleware::auth::authenticate;
use crate::state::AppState;

pub const EMAIL_WARNING_HEADER: &str = "x-email-warning";
pub const EMAIL_WARNING_VALUE: &str = "Email notification failed to send";

/// Install with `axum::middleware::from_fn_with_state`.
pub async fn email_failure_warning(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = authenticate(request.headers(), &state.config.jwt_secret)
        .ok()
        .map(|auth| auth.user_id);

    let response = next.run(request).await;

    if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) || !is_json(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(url = %uri, error = %e, "Failed to buffer response body");
            parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            return Response::from_parts(parts, Body::empty());
        }
    };

    if let Ok(json) = serde_json::from_slice::<Value>(&bytes)
        && json.get("email_sent").and_then(Value::as_bool) == Some(false)
        && let Some(email_error) = json.get("email_error").and_then(Value::as_str)
    {
        let task_id = json.get("id").and_then(|id| id.as_str());
        tracing::warn!(
            url = %uri,
            method = %method,
            user_id = ?user_id,
            email_error = %email_error,
            task_id = ?task_id,
            "Email sending failed in request"
        );
        parts.headers.insert(
            EMAIL_WARNING_HEADER,
            HeaderValue::from_static(EMAIL_WARNING_VALUE),
        );
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}
