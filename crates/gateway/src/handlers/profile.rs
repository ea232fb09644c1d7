use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;

use crate::error::{conflict_on_unique, ApiError};
use crate::models::{ProfileResponse, ProfileUpdateRequest, User};
use crate::security::Principal;
use crate::storage;
use crate::AppState;

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;
    Ok(Json(ProfileResponse::from_user(&user)))
}

/// Merge-update: only provided fields change. Last writer wins.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut user = super::load_user(&state.db, &principal.email).await?;

    if let Some(username) = payload.username {
        user.username = username;
    }
    if let Some(bio) = payload.bio {
        user.bio = Some(bio);
    }
    if let Some(url) = payload.profile_picture_url {
        user.profile_picture_url = Some(url);
    }

    sqlx::query("UPDATE users SET username = $1, bio = $2, profile_picture_url = $3 WHERE id = $4")
        .bind(&user.username)
        .bind(&user.bio)
        .bind(&user.profile_picture_url)
        .bind(user.id)
        .execute(&state.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Username already in use."))?;

    Ok(Json(ProfileResponse::from_user(&user)))
}

pub async fn public_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(ProfileResponse::from_user(&user)))
}

/// Profile pictures are the one upload the gateway proxies itself: receive
/// the bytes, PUT them to storage, persist the resulting long-lived URL.
pub async fn upload_profile_picture(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;

    let mut upload: Option<(String, String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("profilePicture") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("failed to read upload: {}", e)))?;
            upload = Some((file_name, content_type, bytes.to_vec()));
            break;
        }
    }

    let Some((file_name, content_type, bytes)) = upload else {
        return Err(ApiError::Validation(
            "profilePicture file field is required".to_string(),
        ));
    };

    let key = format!(
        "profile-pictures/{}_{}",
        Utc::now().timestamp_millis(),
        file_name
    );

    state
        .storage
        .put_object(&key, bytes, &content_type)
        .await
        .map_err(|e| ApiError::Internal(format!("profile picture upload failed: {}", e)))?;

    let public_url = state
        .storage
        .presign_get(&key, storage::DOWNLOAD_URL_TTL_SECS);

    sqlx::query("UPDATE users SET profile_picture_url = $1 WHERE id = $2")
        .bind(&public_url)
        .bind(user.id)
        .execute(&state.db)
        .await?;

    tracing::info!("profile picture updated for {} ({})", user.email, key);
    Ok(Json(json!({ "publicUrl": public_url })))
}
