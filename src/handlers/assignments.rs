// src/handlers/assignments.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::assignment::{
        AssignmentListParams, AssignmentRow, AssignmentView, BulkQuestionCountsRequest,
        CreateAssignmentRequest, QuestionCounts, UpdateAssignmentRequest,
    },
    services::{
        access::{TeacherContext, ensure_same_owner},
        bulk::{ScopedTopic, select_topics},
        cascade::purge_assignments,
        catalog::{
            check_question_counts, load_assignment_rows, load_student_counts,
            replace_question_counts, resource_covers_topic,
        },
    },
    utils::{extract::ValidatedJson, new_id},
};

fn to_view(row: AssignmentRow, counts: &mut HashMap<String, QuestionCounts>) -> AssignmentView {
    let question_counts = counts.remove(&row.id).unwrap_or_default();
    AssignmentView {
        id: row.id,
        student_id: row.student_id,
        topic_id: row.topic_id,
        topic_name: row.topic_name,
        topic_order: row.topic_order,
        lesson_id: row.lesson_id,
        lesson_name: row.lesson_name,
        group_label: row.group_label,
        completed: row.completed,
        question_counts,
    }
}

/// Loads one assignment in its listed shape.
async fn assignment_view(
    conn: &mut SqliteConnection,
    student_id: &str,
    assignment_id: &str,
) -> Result<AssignmentView, AppError> {
    let row = load_assignment_rows(conn, student_id)
        .await?
        .into_iter()
        .find(|row| row.id == assignment_id)
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;
    let mut counts = load_student_counts(conn, student_id).await?;
    Ok(to_view(row, &mut counts))
}

/// Lists a student's assignments with topic, lesson and question counts.
///
/// Query params: `studentId` (required).
pub async fn list_assignments(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Query(params): Query<AssignmentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    ctx.student(&mut conn, &params.student_id).await?;

    let rows = load_assignment_rows(&mut conn, &params.student_id).await?;
    let mut counts = load_student_counts(&mut conn, &params.student_id).await?;

    let views: Vec<AssignmentView> = rows
        .into_iter()
        .map(|row| to_view(row, &mut counts))
        .collect();
    Ok(Json(views))
}

/// Assigns a topic to a student. A topic can be assigned once per student.
pub async fn create_assignment(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let student = ctx.student(&mut tx, &payload.student_id).await?;
    let topic = ctx.topic(&mut tx, &payload.topic_id).await?;
    let lesson = ctx.lesson(&mut tx, &topic.lesson_id).await?;
    ensure_same_owner(&lesson.teacher_id, &student.teacher_id)?;
    let counts = payload.question_counts.unwrap_or_default();
    check_question_counts(&mut tx, &counts, &topic.id, &student.id).await?;

    let id = new_id();
    sqlx::query(
        "INSERT INTO student_assignments (id, student_id, topic_id, completed, created_at)
         VALUES (?, ?, ?, FALSE, ?)",
    )
    .bind(&id)
    .bind(&student.id)
    .bind(&topic.id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict("Topic is already assigned to this student".to_string())
        }
        other => {
            tracing::error!("Failed to create assignment: {:?}", other);
            other
        }
    })?;

    replace_question_counts(&mut tx, &id, &counts).await?;
    let view = assignment_view(&mut tx, &student.id, &id).await?;
    tx.commit().await?;

    tracing::info!("Topic {} assigned to student {}", topic.id, student.id);
    Ok((StatusCode::CREATED, Json(view)))
}

/// Updates completion and/or replaces the question-count targets.
pub async fn update_assignment(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let assignment = ctx.assignment(&mut tx, &id).await?;

    if let Some(counts) = &payload.question_counts {
        check_question_counts(&mut tx, counts, &assignment.topic_id, &assignment.student_id)
            .await?;
        replace_question_counts(&mut tx, &id, counts).await?;
    }

    if let Some(completed) = payload.completed {
        sqlx::query("UPDATE student_assignments SET completed = ? WHERE id = ?")
            .bind(completed)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    let view = assignment_view(&mut tx, &assignment.student_id, &id).await?;
    tx.commit().await?;

    Ok(Json(view))
}

/// Removes an assignment with its week topics, progress and targets.
pub async fn delete_assignment(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let assignment = ctx.assignment(&mut tx, &id).await?;
    purge_assignments(&mut tx, std::slice::from_ref(&assignment.id)).await?;

    tx.commit().await?;

    tracing::info!("Assignment {} deleted by {}", id, ctx.teacher_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Overwrites one resource's target across every assignment in a scope.
///
/// Assignments whose topic the resource does not cover are skipped.
/// Returns the number of assignments touched.
pub async fn bulk_question_counts(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<BulkQuestionCountsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let student = ctx.student(&mut tx, &payload.student_id).await?;
    let resource = ctx.resource(&mut tx, &payload.resource_id).await?;
    ensure_same_owner(&resource.teacher_id, &student.teacher_id)?;

    let rows = load_assignment_rows(&mut tx, &student.id).await?;
    let scoped: Vec<ScopedTopic> = rows
        .iter()
        .map(|row| ScopedTopic {
            topic_id: row.topic_id.clone(),
            lesson_id: row.lesson_id.clone(),
            group_label: row.group_label.clone(),
        })
        .collect();
    let selected = select_topics(&payload.scope, &scoped);

    let mut updated = 0u64;
    for row in rows.iter().filter(|row| selected.contains(&row.topic_id)) {
        if !resource_covers_topic(&mut tx, &resource.id, &row.topic_id).await? {
            continue;
        }
        sqlx::query(
            "INSERT INTO assignment_question_counts (assignment_id, resource_id, student_id, count)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (assignment_id, resource_id, student_id)
             DO UPDATE SET count = excluded.count",
        )
        .bind(&row.id)
        .bind(&resource.id)
        .bind(&student.id)
        .bind(payload.count)
        .execute(&mut *tx)
        .await?;
        updated += 1;
    }

    tx.commit().await?;

    tracing::info!(
        "Bulk question count {} for resource {} applied to {} assignments of {}",
        payload.count,
        resource.id,
        updated,
        student.id
    );
    Ok(Json(json!({ "updated": updated })))
}
