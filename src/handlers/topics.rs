// src/handlers/topics.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    handlers::lessons::topics_of_lesson,
    models::topic::{CreateTopicRequest, MoveTopicRequest, ReorderRequest, Topic, UpdateTopicRequest},
    services::{
        access::TeacherContext,
        cascade::purge_topics,
        catalog::load_resources_with_links,
        ordering::{
            ensure_permutation, lesson_topic_ids, move_item, resequence_lesson, write_topic_order,
        },
        progress::resources_for_topic,
    },
    utils::{extract::ValidatedJson, new_id},
};

pub async fn list_topics(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    ctx.lesson(&mut conn, &lesson_id).await?;
    let topics = topics_of_lesson(&mut conn, &lesson_id).await?;
    Ok(Json(topics))
}

/// Appends a topic to a lesson. Its order is one past the current maximum.
pub async fn create_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(lesson_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    ctx.lesson(&mut tx, &lesson_id).await?;

    let max_order: Option<i64> =
        sqlx::query_scalar("SELECT MAX(sort_order) FROM lesson_topics WHERE lesson_id = ?")
            .bind(&lesson_id)
            .fetch_one(&mut *tx)
            .await?;

    let topic = sqlx::query_as::<_, Topic>(
        r#"
        INSERT INTO lesson_topics (id, lesson_id, name, sort_order, average_test_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, lesson_id, name, sort_order, average_test_count, created_at
        "#,
    )
    .bind(new_id())
    .bind(&lesson_id)
    .bind(payload.name.trim())
    .bind(max_order.unwrap_or(0) + 1)
    .bind(payload.average_test_count)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create topic: {:?}", e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    tracing::info!("Topic {} added to lesson {}", topic.id, lesson_id);
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn get_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let topic = ctx.topic(&mut conn, &id).await?;
    Ok(Json(topic))
}

pub async fn update_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let current = ctx.topic(&mut conn, &id).await?;

    if payload.name.is_none() && payload.average_test_count.is_none() {
        return Ok(Json(current));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE lesson_topics SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(count) = payload.average_test_count {
        separated.push("average_test_count = ");
        separated.push_bind_unseparated(count);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(&id);
    builder.push(" RETURNING id, lesson_id, name, sort_order, average_test_count, created_at");

    let topic = builder
        .build_query_as::<Topic>()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update topic: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(topic))
}

/// Deletes a topic with its assignments and resource links, then closes the
/// gap in the lesson's order.
pub async fn delete_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let topic = ctx.topic(&mut tx, &id).await?;
    purge_topics(&mut tx, std::slice::from_ref(&topic.id)).await?;
    resequence_lesson(&mut tx, &topic.lesson_id).await?;

    tx.commit().await?;

    tracing::info!("Topic {} deleted by {}", id, ctx.teacher_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Rewrites the order of every topic of a lesson. `ids` must name each
/// topic exactly once.
pub async fn reorder_topics(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(lesson_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    ctx.lesson(&mut tx, &lesson_id).await?;

    let current = lesson_topic_ids(&mut tx, &lesson_id).await?;
    ensure_permutation(&current, &payload.ids)?;
    write_topic_order(&mut tx, &payload.ids).await?;

    let topics = topics_of_lesson(&mut tx, &lesson_id).await?;
    tx.commit().await?;

    Ok(Json(topics))
}

/// Drags one topic to a 1-based position within its lesson.
pub async fn move_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<MoveTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let topic = ctx.topic(&mut tx, &id).await?;

    let mut ids = lesson_topic_ids(&mut tx, &topic.lesson_id).await?;
    let from = ids
        .iter()
        .position(|t| t == &topic.id)
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))?;
    move_item(&mut ids, from, (payload.position - 1) as usize);
    write_topic_order(&mut tx, &ids).await?;

    let topics = topics_of_lesson(&mut tx, &topic.lesson_id).await?;
    tx.commit().await?;

    Ok(Json(topics))
}

/// Resources linked to a topic, one entry per resource with the summed count.
pub async fn topic_resources(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let topic = ctx.topic(&mut conn, &id).await?;
    let lesson = ctx.lesson(&mut conn, &topic.lesson_id).await?;
    let resources = load_resources_with_links(&mut conn, &lesson.teacher_id).await?;
    Ok(Json(resources_for_topic(&topic.id, &resources)))
}
