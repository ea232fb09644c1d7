use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::models::{
    PresignedUrlRequest, PresignedUrlResponse, Transformation, TransformationRequest,
    TransformationResponse,
};
use crate::security::Principal;
use crate::storage;
use crate::AppState;

/// Mint a PUT-signed upload URL for a progress photo. The key is namespaced
/// by the owning user; no existence check, overwrites are permitted.
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;

    let file_name = payload.file_name.trim();
    if file_name.is_empty() {
        return Err(ApiError::Validation("fileName is required".to_string()));
    }

    let object_name = format!("transformations/{}/{}", user.id, file_name);
    let upload_url = state.storage.presign_put(
        &object_name,
        Some(&payload.content_type),
        storage::UPLOAD_URL_TTL_SECS,
    );

    tracing::debug!("minted upload url for {}", object_name);
    Ok(Json(PresignedUrlResponse {
        upload_url,
        object_name,
    }))
}

/// Register photo metadata after the client's direct PUT. Duplicate records
/// for the same key, user, and date are accepted product behavior.
pub async fn save(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<TransformationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;

    let taken_on = NaiveDate::parse_from_str(&payload.date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("Invalid date format: {}", payload.date)))?;

    sqlx::query(
        "INSERT INTO transformations (user_id, object_key, pose, taken_on) VALUES ($1, $2, $3, $4)",
    )
    .bind(user.id)
    .bind(&payload.image_key)
    .bind(&payload.pose)
    .bind(taken_on)
    .execute(&state.db)
    .await?;

    tracing::debug!("saved transformation {} for user {}", payload.image_key, user.id);
    Ok(Json(json!({ "message": "Transformation saved" })))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<TransformationResponse>>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;

    let records = sqlx::query_as::<_, Transformation>(
        "SELECT * FROM transformations WHERE user_id = $1 ORDER BY taken_on DESC, id DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlQuery {
    pub object_name: String,
}

/// Mint a GET-signed download URL for a stored photo. Ownership is resolved
/// by scanning every record with this key — duplicates are allowed, so any
/// one of them belonging to the caller grants access.
pub async fn image_url(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ImageUrlQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = super::load_user(&state.db, &principal.email).await?;

    let owner_ids =
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM transformations WHERE object_key = $1")
            .bind(&query.object_name)
            .fetch_all(&state.db)
            .await?;

    if owner_ids.is_empty() {
        return Err(ApiError::NotFound("Transformation not found".to_string()));
    }
    if !owner_ids.contains(&user.id) {
        tracing::warn!(
            "user {} attempted to access transformation {} owned by someone else",
            user.id,
            query.object_name
        );
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    let signed_url = state
        .storage
        .presign_get(&query.object_name, storage::DOWNLOAD_URL_TTL_SECS);

    Ok(Json(json!({ "signedUrl": signed_url })))
}
