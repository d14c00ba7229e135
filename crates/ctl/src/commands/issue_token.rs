//! `issue-token`: sign an API token for an existing user.

use sqlx::PgPool;
use uuid::Uuid;

use taskmail_api::middleware::auth::encode_jwt;
use taskmail_common::config::AppConfig;
use taskmail_tasks::user::UserService;

/// The admin claim is taken from the user row.
pub async fn run(config: &AppConfig, pool: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let user = UserService::get(pool, user_id).await?;
    let token = encode_jwt(
        user.id,
        user.is_admin,
        &config.jwt_secret,
        config.jwt_expiry_hours,
    )?;

    tracing::info!(user_id = %user.id, admin = user.is_admin, "Issued API token");
    println!("{}", token);
    Ok(())
}
