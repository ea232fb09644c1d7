use std::sync::Arc;

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use rand::RngCore;
use serde::Deserialize;

use crate::models::User;
use crate::security;
use crate::{token, AppState};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Google OAuth callback. Every outcome is a redirect back to the front-end;
/// the query flag tells the login page what happened.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let frontend = state.config.frontend_url.clone();

    if query.error.is_some() {
        return Redirect::to(&format!("{}/login?oauth=canceled", frontend)).into_response();
    }
    let Some(code) = query.code else {
        return Redirect::to(&format!("{}/login?oauth=error", frontend)).into_response();
    };

    match oauth_login(&state, &code).await {
        Ok(session_token) => {
            let mut headers = HeaderMap::new();
            let cookie = security::build_cookie(
                security::AUTH_COOKIE,
                &session_token,
                token::SESSION_TTL_SECS,
                state.config.cookie_secure,
            );
            if let Ok(v) = HeaderValue::from_str(&cookie) {
                headers.append(SET_COOKIE, v);
            }
            (headers, Redirect::to(&format!("{}/home", frontend))).into_response()
        }
        Err(e) => {
            tracing::warn!("google oauth callback failed: {}", e);
            Redirect::to(&format!("{}/login?oauth=error", frontend)).into_response()
        }
    }
}

async fn oauth_login(state: &AppState, code: &str) -> Result<String> {
    let tokens = state.google.exchange_code(code).await?;
    let info = state.google.fetch_user(&tokens.access_token).await?;
    let email = info.email.trim().to_ascii_lowercase();

    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user_id = match existing {
        Some(user) => user.id,
        None => {
            // First OAuth login: provision an auto-verified account with an
            // unusable random password.
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            let random_password = hex::encode(bytes);

            let password_hash = tokio::task::spawn_blocking(move || {
                let salt = SaltString::generate(&mut OsRng);
                Argon2::default()
                    .hash_password(random_password.as_bytes(), &salt)
                    .map(|hash| hash.to_string())
            })
            .await?
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;

            let id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO users (email, username, password_hash, first_name, last_name, is_verified)
                VALUES ($1, $2, $3, $4, $5, TRUE)
                RETURNING id
                "#,
            )
            .bind(&email)
            .bind(&email)
            .bind(&password_hash)
            .bind(info.given_name.unwrap_or_default())
            .bind(info.family_name.unwrap_or_default())
            .fetch_one(&state.db)
            .await?;

            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(id)
                .bind(security::ROLE_USER)
                .execute(&state.db)
                .await?;

            tracing::info!("provisioned new account via google oauth: {}", email);
            id
        }
    };

    let roles = super::fetch_roles(&state.db, user_id).await?;
    let session_token = token::issue(&email, &roles, &state.config.jwt_secret)?;
    Ok(session_token)
}
