pub mod email_status;
pub mod health;
pub mod queue;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(tasks::router(state.clone()))
        .merge(email_status::router())
        .merge(queue::router())
        .with_state(state)
}
