pub mod auth;
pub mod oauth;
pub mod profile;
pub mod transformations;
pub mod workouts;

use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::User;

/// Resolve the acting user row by the principal's email. The principal only
/// proves who the token was issued to; the row may have gone away since.
pub(crate) async fn load_user(db: &PgPool, email: &str) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Explicit joined fetch of a user's roles.
pub(crate) async fn fetch_roles(db: &PgPool, user_id: i64) -> Result<Vec<String>, ApiError> {
    let roles =
        sqlx::query_scalar::<_, String>("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
            .bind(user_id)
            .fetch_all(db)
            .await?;
    Ok(roles)
}
