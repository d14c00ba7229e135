//! User lookups needed by task mutation and notification dispatch.

use sqlx::PgPool;
use uuid::Uuid;

use taskmail_common::error::AppError;
use taskmail_common::types::User;

/// Read-only access to the `users` table.
pub struct UserService;

impl UserService {
    /// Get a single user by ID.
    pub async fn get(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        Ok(user)
    }

    /// Get a user that a request refers to by ID.
    ///
    /// A missing user here is a bad request, not a missing route resource.
    pub async fn get_referenced(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
        match Self::get(pool, user_id).await {
            Err(AppError::NotFound(_)) => Err(AppError::Validation(format!(
                "The selected user_id {} is invalid",
                user_id
            ))),
            other => other,
        }
    }

    /// The oldest user, used by the operator CLI when no user is given.
    pub async fn first(pool: &PgPool) -> Result<Option<User>, AppError> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users ORDER BY created_at ASC LIMIT 1")
                .fetch_optional(pool)
                .await?;

        Ok(user)
    }
}
