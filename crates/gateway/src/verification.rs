use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;

/// Verification tokens live for 24 hours.
pub const VERIFICATION_TTL_HOURS: i64 = 24;

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Create a fresh verification token for the user, replacing any existing
/// one. At most one live token per identity.
pub async fn create_token_for_user(db: &PgPool, user_id: i64) -> Result<String, sqlx::Error> {
    sqlx::query("DELETE FROM email_verification_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS);

    sqlx::query(
        "INSERT INTO email_verification_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(&token)
    .bind(expires_at)
    .execute(db)
    .await?;

    Ok(token)
}

pub fn verify_link(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/auth/verify-email?token={}",
        public_base_url.trim_end_matches('/'),
        token
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_url_safe_and_long_enough() {
        let token = generate_token();
        // 32 bytes -> 43 base64url chars without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn link_points_at_the_verify_endpoint() {
        let link = verify_link("http://localhost:8080/", "abc");
        assert_eq!(link, "http://localhost:8080/auth/verify-email?token=abc");
    }
}
