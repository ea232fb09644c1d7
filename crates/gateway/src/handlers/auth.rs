use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::task;

use crate::error::{conflict_on_unique, ApiError};
use crate::models::{EmailVerificationToken, LoginRequest, RegisterRequest, User};
use crate::security::{self, Principal};
use crate::{token, verification, AppState};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim().to_ascii_lowercase();
    let first_name = payload.first_name.trim().to_string();
    let last_name = payload.last_name.trim().to_string();

    if email.is_empty() || payload.password.is_empty() || first_name.is_empty() || last_name.is_empty()
    {
        return Err(ApiError::Validation("All fields are required.".to_string()));
    }

    tracing::info!("register request for {}", email);

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already in use.".to_string()));
    }

    let password = payload.password.clone();
    let password_hash = task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("password hashing worker failed: {}", e)))?
    .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    let user_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO users (email, username, password_hash, first_name, last_name, is_verified)
        VALUES ($1, $2, $3, $4, $5, FALSE)
        RETURNING id
        "#,
    )
    .bind(&email)
    .bind(&email)
    .bind(&password_hash)
    .bind(&first_name)
    .bind(&last_name)
    .fetch_one(&state.db)
    .await
    .map_err(|e| conflict_on_unique(e, "Email already in use."))?;

    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
        .bind(user_id)
        .bind(security::ROLE_USER)
        .execute(&state.db)
        .await?;

    // Best-effort verification email; a broken mail provider must never fail
    // the registration itself.
    let st = state.clone();
    let to_email = email.clone();
    tokio::spawn(async move {
        match verification::create_token_for_user(&st.db, user_id).await {
            Ok(token) => {
                let link = verification::verify_link(&st.config.public_base_url, &token);
                st.mailer.send_verification_email(&to_email, &link).await;
            }
            Err(e) => {
                tracing::error!("failed to create verification token for {}: {}", to_email, e)
            }
        }
    });

    Ok(Json(json!({
        "message": "User registered successfully! Please check your email to verify your account."
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// Redirect-based outcome: the front-end login page reads the query flag.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Redirect, ApiError> {
    let frontend = &state.config.frontend_url;

    let row = sqlx::query_as::<_, EmailVerificationToken>(
        "SELECT * FROM email_verification_tokens WHERE token = $1",
    )
    .bind(&query.token)
    .fetch_optional(&state.db)
    .await?;

    let Some(row) = row else {
        return Ok(Redirect::to(&format!(
            "{}/login?verification=invalid",
            frontend
        )));
    };

    if row.expires_at < Utc::now() {
        return Ok(Redirect::to(&format!(
            "{}/login?verification=expired",
            frontend
        )));
    }

    sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1")
        .bind(row.user_id)
        .execute(&state.db)
        .await?;
    // Single-use: a second visit with the same token lands on "invalid".
    sqlx::query("DELETE FROM email_verification_tokens WHERE id = $1")
        .bind(row.id)
        .execute(&state.db)
        .await?;

    tracing::info!("email verified for user {}", row.user_id);
    Ok(Redirect::to(&format!("{}/login?verified=true", frontend)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = payload.email.trim().to_ascii_lowercase();

    // Identical response for unknown email and wrong password.
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid Credentials".to_string()))?;

    let password = payload.password.clone();
    let hash = user.password_hash.clone();
    let is_valid = task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| ApiError::Internal(format!("password verification worker failed: {}", e)))?;

    if !is_valid {
        return Err(ApiError::Unauthorized("Invalid Credentials".to_string()));
    }

    if !user.is_verified {
        return Err(ApiError::Forbidden(
            "Please verify your email before logging in.".to_string(),
        ));
    }

    let roles = super::fetch_roles(&state.db, user.id).await?;
    let token = token::issue(&user.email, &roles, &state.config.jwt_secret)
        .map_err(|e| ApiError::Internal(format!("token issue failed: {}", e)))?;

    let mut headers = HeaderMap::new();
    let cookie = security::build_cookie(
        security::AUTH_COOKIE,
        &token,
        token::SESSION_TTL_SECS,
        state.config.cookie_secure,
    );
    if let Ok(v) = HeaderValue::from_str(&cookie) {
        headers.append(SET_COOKIE, v);
    }

    tracing::info!("login success for {}", user.email);
    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Login successful" })),
    )
        .into_response())
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;
    let roles = super::fetch_roles(&state.db, user.id).await?;
    Ok(Json(json!({ "email": user.email, "roles": roles })))
}

pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    let cookie = security::clear_cookie(security::AUTH_COOKIE, state.config.cookie_secure);
    if let Ok(v) = HeaderValue::from_str(&cookie) {
        headers.append(SET_COOKIE, v);
    }
    (StatusCode::OK, headers, Json(json!({ "message": "Logged out" })))
}
