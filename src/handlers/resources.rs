// src/handlers/resources.rs

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::resource::{Resource, ResourceWithLinks, UpsertResourceRequest},
    services::{
        access::{TeacherContext, ensure_same_owner},
        cascade::{clear_resource_links, purge_resource},
        catalog::load_resources_with_links,
        ordering::lesson_topic_ids,
    },
    utils::{extract::ValidatedJson, html::clean_optional, new_id},
};

/// Recreates the lesson and topic links of a resource from a request.
///
/// Topic ids are kept only under the submitted lesson they belong to.
async fn write_links(
    conn: &mut SqliteConnection,
    ctx: &TeacherContext,
    resource: &Resource,
    payload: &UpsertResourceRequest,
) -> Result<(), AppError> {
    let resource_id = resource.id.as_str();
    let wanted: HashSet<&str> = payload.topic_ids.iter().map(String::as_str).collect();
    let mut seen_lessons = HashSet::new();

    for lesson_id in &payload.lesson_ids {
        if !seen_lessons.insert(lesson_id.as_str()) {
            continue;
        }
        let lesson = ctx.lesson(conn, lesson_id).await?;
        ensure_same_owner(&lesson.teacher_id, &resource.teacher_id)?;

        sqlx::query("INSERT INTO resource_lessons (id, resource_id, lesson_id) VALUES (?, ?, ?)")
            .bind(new_id())
            .bind(resource_id)
            .bind(lesson_id)
            .execute(&mut *conn)
            .await?;

        let lesson_topics = lesson_topic_ids(conn, lesson_id).await?;
        for topic_id in lesson_topics.iter().filter(|t| wanted.contains(t.as_str())) {
            let count = payload
                .topic_question_counts
                .get(topic_id)
                .copied()
                .unwrap_or(0);
            sqlx::query(
                "INSERT INTO resource_topics (id, resource_id, lesson_id, topic_id, question_count)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(resource_id)
            .bind(lesson_id)
            .bind(topic_id)
            .bind(count)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

async fn resource_with_links(
    conn: &mut SqliteConnection,
    resource: &Resource,
) -> Result<ResourceWithLinks, AppError> {
    let resource_id = resource.id.as_str();
    load_resources_with_links(conn, &resource.teacher_id)
        .await?
        .into_iter()
        .find(|r| r.resource.id == resource_id)
        .ok_or_else(|| AppError::NotFound("Resource not found".to_string()))
}

/// Lists the teacher's resources with their lesson and topic links.
pub async fn list_resources(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let resources = load_resources_with_links(&mut conn, &ctx.teacher_id).await?;
    Ok(Json(resources))
}

pub async fn get_resource(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let resource = ctx.resource(&mut conn, &id).await?;
    let resource = resource_with_links(&mut conn, &resource).await?;
    Ok(Json(resource))
}

pub async fn create_resource(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<UpsertResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let resource = sqlx::query_as::<_, Resource>(
        r#"
        INSERT INTO resources (id, teacher_id, name, description, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, teacher_id, name, description, created_at
        "#,
    )
    .bind(new_id())
    .bind(&ctx.teacher_id)
    .bind(payload.name.trim())
    .bind(clean_optional(payload.description.as_deref()))
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create resource: {:?}", e);
        AppError::from(e)
    })?;

    write_links(&mut tx, &ctx, &resource, &payload).await?;
    let created = resource_with_links(&mut tx, &resource).await?;
    tx.commit().await?;

    tracing::info!("Resource {} created by {}", resource.id, ctx.teacher_id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replaces a resource's fields and all of its links in one transaction.
pub async fn update_resource(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpsertResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let resource = ctx.resource(&mut tx, &id).await?;

    sqlx::query("UPDATE resources SET name = ?, description = ? WHERE id = ?")
        .bind(payload.name.trim())
        .bind(clean_optional(payload.description.as_deref()))
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    clear_resource_links(&mut tx, &id).await?;
    write_links(&mut tx, &ctx, &resource, &payload).await.map_err(|e| {
        tracing::error!("Failed to relink resource {}: {:?}", id, e);
        e
    })?;

    let updated = resource_with_links(&mut tx, &resource).await?;
    tx.commit().await?;

    tracing::info!("Resource {} updated by {}", id, ctx.teacher_id);
    Ok(Json(updated))
}

pub async fn delete_resource(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    ctx.resource(&mut tx, &id).await?;
    purge_resource(&mut tx, &id).await?;

    tx.commit().await?;

    tracing::info!("Resource {} deleted by {}", id, ctx.teacher_id);
    Ok(StatusCode::NO_CONTENT)
}
