use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_verified: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmailVerificationToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MuscleGroupRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Transformation {
    pub id: i64,
    pub user_id: i64,
    pub object_key: String,
    pub pose: String,
    pub taken_on: NaiveDate,
}

/// Session token claims: subject email plus a role snapshot taken at issue time.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<String>,
    pub iat: usize,
    pub exp: usize,
}

// ── API Payloads ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub username: String,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub joined_date: Option<DateTime<Utc>>,
}

impl ProfileResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            bio: user.bio.clone(),
            profile_picture_url: user.profile_picture_url.clone(),
            joined_date: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MuscleGroup {
    pub id: i64,
    pub name: String,
    pub exercises: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MuscleGroupCreateRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuscleGroupRenameRequest {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ExerciseRequest {
    pub exercise: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub object_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationRequest {
    pub image_key: String,
    pub date: String,
    pub pose: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResponse {
    pub id: i64,
    pub object_key: String,
    pub pose: String,
    pub taken_on: NaiveDate,
}

impl From<Transformation> for TransformationResponse {
    fn from(t: Transformation) -> Self {
        Self {
            id: t.id,
            object_key: t.object_key,
            pose: t.pose,
            taken_on: t.taken_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_accepts_camel_case_fields() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@x.com","password":"pw","firstName":"A","lastName":"B"}"#,
        )
        .unwrap();
        assert_eq!(req.first_name, "A");
        assert_eq!(req.last_name, "B");
    }

    #[test]
    fn presigned_url_response_serializes_camel_case() {
        let resp = PresignedUrlResponse {
            upload_url: "https://storage/x".to_string(),
            object_name: "transformations/1/front.png".to_string(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("uploadUrl").is_some());
        assert!(json.get("objectName").is_some());
    }

    #[test]
    fn transformation_request_reads_image_key() {
        let req: TransformationRequest = serde_json::from_str(
            r#"{"imageKey":"transformations/1/front.png","date":"2026-08-01","pose":"front"}"#,
        )
        .unwrap();
        assert_eq!(req.image_key, "transformations/1/front.png");
        assert_eq!(req.pose, "front");
    }
}
