// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        assignment::StudentAssignment,
        progress::{ProgressListParams, RecordSolvedRequest, SetSolvedRequest, StudentProgress},
    },
    services::{
        access::{TeacherContext, find_assignment},
        catalog::{load_student_report, resource_covers_topic},
    },
    utils::{extract::ValidatedJson, jwt::Claims, new_id},
};

async fn ensure_resource_covers(
    conn: &mut SqliteConnection,
    assignment: &StudentAssignment,
    resource_id: &str,
) -> Result<(), AppError> {
    if !resource_covers_topic(conn, resource_id, &assignment.topic_id).await? {
        return Err(AppError::BadRequest(format!(
            "Resource '{}' is not linked to this topic",
            resource_id
        )));
    }
    Ok(())
}

/// "I solved a question": adds `amount` (default 1) to the solved count.
///
/// Students may record progress on their own assignments; teachers on the
/// assignments of their students.
pub async fn record_solved(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<RecordSolvedRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let assignment = if claims.is_student() {
        let assignment = find_assignment(&mut tx, &payload.assignment_id).await?;
        if assignment.student_id != claims.sub {
            return Err(AppError::AuthError("Unauthorized".to_string()));
        }
        assignment
    } else {
        let ctx = TeacherContext::from_claims(&claims)?;
        ctx.assignment(&mut tx, &payload.assignment_id).await?
    };

    ensure_resource_covers(&mut tx, &assignment, &payload.resource_id).await?;

    let progress = sqlx::query_as::<_, StudentProgress>(
        r#"
        INSERT INTO student_progress (id, student_id, assignment_id, resource_id, solved_count, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (assignment_id, resource_id)
        DO UPDATE SET solved_count = solved_count + excluded.solved_count,
                      updated_at = excluded.updated_at
        RETURNING id, student_id, assignment_id, resource_id, solved_count, updated_at
        "#,
    )
    .bind(new_id())
    .bind(&assignment.student_id)
    .bind(&assignment.id)
    .bind(&payload.resource_id)
    .bind(payload.amount.unwrap_or(1))
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record progress: {:?}", e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    tracing::info!(
        "Progress on {}/{} is now {}",
        progress.assignment_id,
        progress.resource_id,
        progress.solved_count
    );
    Ok(Json(progress))
}

/// Sets the solved count of an (assignment, resource) pair outright.
pub async fn set_solved(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<SetSolvedRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let assignment = ctx.assignment(&mut tx, &payload.assignment_id).await?;
    ensure_resource_covers(&mut tx, &assignment, &payload.resource_id).await?;

    let progress = sqlx::query_as::<_, StudentProgress>(
        r#"
        INSERT INTO student_progress (id, student_id, assignment_id, resource_id, solved_count, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (assignment_id, resource_id)
        DO UPDATE SET solved_count = excluded.solved_count,
                      updated_at = excluded.updated_at
        RETURNING id, student_id, assignment_id, resource_id, solved_count, updated_at
        "#,
    )
    .bind(new_id())
    .bind(&assignment.student_id)
    .bind(&assignment.id)
    .bind(&payload.resource_id)
    .bind(payload.solved_count)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Teacher {} set progress on {}/{} to {}",
        ctx.teacher_id,
        progress.assignment_id,
        progress.resource_id,
        progress.solved_count
    );
    Ok(Json(progress))
}

/// Progress rows of one assignment.
///
/// Query params: `assignmentId` (required).
pub async fn list_progress(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Query(params): Query<ProgressListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    ctx.assignment(&mut conn, &params.assignment_id).await?;

    let rows = sqlx::query_as::<_, StudentProgress>(
        "SELECT id, student_id, assignment_id, resource_id, solved_count, updated_at
         FROM student_progress WHERE assignment_id = ?
         ORDER BY resource_id",
    )
    .bind(&params.assignment_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(rows))
}

/// The calling student's own progress report.
pub async fn my_progress(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let teacher_id: String = sqlx::query_scalar("SELECT teacher_id FROM students WHERE id = ?")
        .bind(&claims.sub)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::AuthError("Session no longer valid".to_string()))?;

    let report = load_student_report(&mut conn, &teacher_id, &claims.sub).await?;
    Ok(Json(report))
}
