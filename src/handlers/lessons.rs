// src/handlers/lessons.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        lesson::{CreateLessonRequest, Lesson, LessonWithTopics, UpdateLessonRequest},
        topic::Topic,
    },
    services::{access::TeacherContext, cascade::purge_lesson, palette::{DEFAULT_LESSON_COLOR, pick_color}},
    utils::{extract::ValidatedJson, new_id},
};

pub(crate) async fn topics_of_lesson(
    conn: &mut SqliteConnection,
    lesson_id: &str,
) -> Result<Vec<Topic>, AppError> {
    let topics = sqlx::query_as::<_, Topic>(
        "SELECT id, lesson_id, name, sort_order, average_test_count, created_at
         FROM lesson_topics WHERE lesson_id = ?
         ORDER BY sort_order, created_at",
    )
    .bind(lesson_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(topics)
}

/// Lists the teacher's lessons, each with its ordered topics.
pub async fn list_lessons(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let lessons = sqlx::query_as::<_, Lesson>(
        "SELECT id, teacher_id, name, group_label, exam_type, subject, color, created_at
         FROM lessons WHERE teacher_id = ?
         ORDER BY created_at, name",
    )
    .bind(&ctx.teacher_id)
    .fetch_all(&mut *conn)
    .await?;

    let topics = sqlx::query_as::<_, Topic>(
        "SELECT t.id, t.lesson_id, t.name, t.sort_order, t.average_test_count, t.created_at
         FROM lesson_topics t
         JOIN lessons l ON l.id = t.lesson_id
         WHERE l.teacher_id = ?
         ORDER BY t.sort_order, t.created_at",
    )
    .bind(&ctx.teacher_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_lesson: HashMap<String, Vec<Topic>> = HashMap::new();
    for topic in topics {
        by_lesson.entry(topic.lesson_id.clone()).or_default().push(topic);
    }

    let result: Vec<LessonWithTopics> = lessons
        .into_iter()
        .map(|lesson| {
            let topics = by_lesson.remove(&lesson.id).unwrap_or_default();
            LessonWithTopics { lesson, topics }
        })
        .collect();

    Ok(Json(result))
}

pub async fn get_lesson(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let lesson = ctx.lesson(&mut conn, &id).await?;
    let topics = topics_of_lesson(&mut conn, &lesson.id).await?;
    Ok(Json(LessonWithTopics { lesson, topics }))
}

/// Creates a lesson. Without an explicit color, the first palette color not
/// used by the teacher's other lessons is assigned.
pub async fn create_lesson(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    // Inserting first takes the write lock, so concurrent creates read the
    // palette one after another.
    let mut lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons (id, teacher_id, name, group_label, exam_type, subject, color, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, teacher_id, name, group_label, exam_type, subject, color, created_at
        "#,
    )
    .bind(new_id())
    .bind(&ctx.teacher_id)
    .bind(payload.name.trim())
    .bind(payload.group_label.trim())
    .bind(payload.exam_type.trim())
    .bind(payload.subject.trim())
    .bind(payload.color.as_deref().unwrap_or(DEFAULT_LESSON_COLOR))
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create lesson: {:?}", e);
        AppError::from(e)
    })?;

    if payload.color.is_none() {
        let used: Vec<String> =
            sqlx::query_scalar("SELECT color FROM lessons WHERE teacher_id = ? AND id != ?")
                .bind(&ctx.teacher_id)
                .bind(&lesson.id)
                .fetch_all(&mut *tx)
                .await?;
        lesson.color = pick_color(&used).to_string();

        sqlx::query("UPDATE lessons SET color = ? WHERE id = ?")
            .bind(&lesson.color)
            .bind(&lesson.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!("Lesson {} created by {}", lesson.id, ctx.teacher_id);
    Ok((
        StatusCode::CREATED,
        Json(LessonWithTopics {
            lesson,
            topics: Vec::new(),
        }),
    ))
}

pub async fn update_lesson(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let current = ctx.lesson(&mut conn, &id).await?;

    if payload.name.is_none()
        && payload.group_label.is_none()
        && payload.exam_type.is_none()
        && payload.subject.is_none()
        && payload.color.is_none()
    {
        return Ok(Json(current));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE lessons SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(group_label) = payload.group_label {
        separated.push("group_label = ");
        separated.push_bind_unseparated(group_label.trim().to_string());
    }

    if let Some(exam_type) = payload.exam_type {
        separated.push("exam_type = ");
        separated.push_bind_unseparated(exam_type.trim().to_string());
    }

    if let Some(subject) = payload.subject {
        separated.push("subject = ");
        separated.push_bind_unseparated(subject.trim().to_string());
    }

    if let Some(color) = payload.color {
        separated.push("color = ");
        separated.push_bind_unseparated(color);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(&id);

    builder.build().execute(&mut *conn).await.map_err(|e| {
        tracing::error!("Failed to update lesson: {:?}", e);
        AppError::from(e)
    })?;

    let lesson = ctx.lesson(&mut conn, &id).await?;
    Ok(Json(lesson))
}

/// Deletes a lesson together with its topics, their assignments and
/// every resource link, in one transaction.
pub async fn delete_lesson(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    ctx.lesson(&mut tx, &id).await?;
    purge_lesson(&mut tx, &id).await.map_err(|e| {
        tracing::error!("Failed to delete lesson {}: {:?}", id, e);
        e
    })?;

    tx.commit().await?;

    tracing::info!("Lesson {} deleted by {}", id, ctx.teacher_id);
    Ok(StatusCode::NO_CONTENT)
}
