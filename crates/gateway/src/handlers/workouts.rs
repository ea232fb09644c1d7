use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use sqlx::PgPool;

use crate::error::{conflict_on_unique, ApiError};
use crate::models::{
    ExerciseRequest, MuscleGroup, MuscleGroupCreateRequest, MuscleGroupRenameRequest,
    MuscleGroupRow,
};
use crate::AppState;

// Admin-only catalog; the gatekeeper's route policy enforces the role.

async fn load_group(db: &PgPool, name: &str) -> Result<MuscleGroup, ApiError> {
    let row = sqlx::query_as::<_, MuscleGroupRow>("SELECT id, name FROM muscle_groups WHERE name = $1")
        .bind(name)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Muscle group not found".to_string()))?;

    let exercises = sqlx::query_scalar::<_, String>(
        "SELECT exercise FROM muscle_group_exercises WHERE muscle_group_id = $1 ORDER BY position",
    )
    .bind(row.id)
    .fetch_all(db)
    .await?;

    Ok(MuscleGroup {
        id: row.id,
        name: row.name,
        exercises,
    })
}

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MuscleGroup>>, ApiError> {
    let rows = sqlx::query_as::<_, MuscleGroupRow>("SELECT id, name FROM muscle_groups ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    let exercises = sqlx::query_as::<_, (i64, String)>(
        "SELECT muscle_group_id, exercise FROM muscle_group_exercises ORDER BY muscle_group_id, position",
    )
    .fetch_all(&state.db)
    .await?;

    let mut groups: Vec<MuscleGroup> = rows
        .into_iter()
        .map(|r| MuscleGroup {
            id: r.id,
            name: r.name,
            exercises: Vec::new(),
        })
        .collect();

    for (group_id, exercise) in exercises {
        if let Some(group) = groups.iter_mut().find(|g| g.id == group_id) {
            group.exercises.push(exercise);
        }
    }

    Ok(Json(groups))
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MuscleGroupCreateRequest>,
) -> Result<Json<MuscleGroup>, ApiError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation(
            "Muscle group name is required".to_string(),
        ));
    }

    let id = sqlx::query_scalar::<_, i64>("INSERT INTO muscle_groups (name) VALUES ($1) RETURNING id")
        .bind(&name)
        .fetch_one(&state.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Muscle group already exists"))?;

    tracing::info!("muscle group created: {}", name);
    Ok(Json(MuscleGroup {
        id,
        name,
        exercises: Vec::new(),
    }))
}

pub async fn rename_group(
    State(state): State<Arc<AppState>>,
    Path(old_name): Path<String>,
    Json(payload): Json<MuscleGroupRenameRequest>,
) -> Result<Json<MuscleGroup>, ApiError> {
    let new_name = payload.new_name.trim().to_string();
    if new_name.is_empty() {
        return Err(ApiError::Validation(
            "Muscle group name is required".to_string(),
        ));
    }

    let result = sqlx::query("UPDATE muscle_groups SET name = $1 WHERE name = $2")
        .bind(&new_name)
        .bind(&old_name)
        .execute(&state.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Muscle group already exists"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Muscle group not found".to_string()));
    }

    let group = load_group(&state.db, &new_name).await?;
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = sqlx::query("DELETE FROM muscle_groups WHERE name = $1")
        .bind(&name)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Muscle group not found".to_string()));
    }

    tracing::info!("muscle group deleted: {}", name);
    Ok(Json(json!({ "message": "Muscle group deleted" })))
}

pub async fn add_exercise(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<ExerciseRequest>,
) -> Result<Json<MuscleGroup>, ApiError> {
    let exercise = payload.exercise.trim().to_string();
    if exercise.is_empty() {
        return Err(ApiError::Validation("Exercise name is required".to_string()));
    }

    let group = load_group(&state.db, &name).await?;

    // Append at the end of the order.
    sqlx::query(
        r#"
        INSERT INTO muscle_group_exercises (muscle_group_id, exercise, position)
        SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
        FROM muscle_group_exercises WHERE muscle_group_id = $1
        "#,
    )
    .bind(group.id)
    .bind(&exercise)
    .execute(&state.db)
    .await?;

    let group = load_group(&state.db, &name).await?;
    Ok(Json(group))
}

pub async fn remove_exercise(
    State(state): State<Arc<AppState>>,
    Path((name, exercise)): Path<(String, String)>,
) -> Result<Json<MuscleGroup>, ApiError> {
    let group = load_group(&state.db, &name).await?;

    let result = sqlx::query(
        "DELETE FROM muscle_group_exercises WHERE muscle_group_id = $1 AND LOWER(exercise) = LOWER($2)",
    )
    .bind(group.id)
    .bind(&exercise)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Exercise not found".to_string()));
    }

    let group = load_group(&state.db, &name).await?;
    Ok(Json(group))
}
