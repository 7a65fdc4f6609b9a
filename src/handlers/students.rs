// src/handlers/students.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::student::{
        CreateStudentRequest, Paginated, Pagination, STUDENT_STATUSES, Student, StudentDetails,
        StudentListParams, UpdateStudentRequest,
    },
    services::{access::TeacherContext, cascade::purge_student, catalog::load_student_report},
    utils::{extract::ValidatedJson, hash::hash_password, html::clean_optional, new_id},
};

const STUDENT_COLUMNS: &str = "id, teacher_id, name, email, password, phone, parent_name, \
                               parent_phone, notes, status, created_at";

fn push_list_filters<'a>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    teacher_id: &'a str,
    params: &'a StudentListParams,
) {
    builder.push(" WHERE teacher_id = ");
    builder.push_bind(teacher_id);

    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q.to_lowercase());
        builder.push(" AND (LOWER(name) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR LOWER(COALESCE(email, '')) LIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(status) = &params.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
}

fn duplicate_email(e: sqlx::Error) -> AppError {
    match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email is already in use".to_string()),
        other => {
            tracing::error!("Failed to save student: {:?}", other);
            other
        }
    }
}

/// Lists the teacher's students page by page.
///
/// Query params: `page` (default 1), `limit` (default 20, max 100),
/// `q` (name/email substring), `status`.
pub async fn list_students(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Query(params): Query<StudentListParams>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(status) = &params.status {
        if !STUDENT_STATUSES.contains(&status.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown status '{}'", status)));
        }
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;

    let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM students");
    push_list_filters(&mut count_query, &ctx.teacher_id, &params);
    let total = count_query
        .build_query_scalar::<i64>()
        .fetch_one(&pool)
        .await?;

    let mut list_query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM students", STUDENT_COLUMNS));
    push_list_filters(&mut list_query, &ctx.teacher_id, &params);
    list_query.push(" ORDER BY name, id LIMIT ");
    list_query.push_bind(limit);
    list_query.push(" OFFSET ");
    list_query.push_bind(offset);

    let students = list_query
        .build_query_as::<Student>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list students: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(Paginated {
        data: students,
        pagination: Pagination::new(page, limit, total),
    }))
}

pub async fn create_student(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password = match payload.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let student = sqlx::query_as::<_, Student>(&format!(
        "INSERT INTO students (id, teacher_id, name, email, password, phone, parent_name,
                               parent_phone, notes, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {}",
        STUDENT_COLUMNS
    ))
    .bind(new_id())
    .bind(&ctx.teacher_id)
    .bind(payload.name.trim())
    .bind(payload.email.map(|e| e.trim().to_lowercase()))
    .bind(password)
    .bind(payload.phone)
    .bind(payload.parent_name)
    .bind(payload.parent_phone)
    .bind(clean_optional(payload.notes.as_deref()))
    .bind(payload.status.unwrap_or_else(|| "ACTIVE".to_string()))
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(duplicate_email)?;

    tracing::info!("Student {} created by {}", student.id, ctx.teacher_id);
    Ok((StatusCode::CREATED, Json(student)))
}

/// Student record together with its progress report.
pub async fn get_student(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let student = ctx.student(&mut conn, &id).await?;
    let progress = load_student_report(&mut conn, &student.teacher_id, &student.id).await?;
    Ok(Json(StudentDetails { student, progress }))
}

pub async fn update_student(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let current = ctx.student(&mut conn, &id).await?;

    let password = match payload.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE students SET ");
    let mut separated = builder.separated(", ");
    let mut changed = false;

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
        changed = true;
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email.trim().to_lowercase());
        changed = true;
    }

    if let Some(password) = password {
        separated.push("password = ");
        separated.push_bind_unseparated(password);
        changed = true;
    }

    if let Some(phone) = payload.phone {
        separated.push("phone = ");
        separated.push_bind_unseparated(phone);
        changed = true;
    }

    if let Some(parent_name) = payload.parent_name {
        separated.push("parent_name = ");
        separated.push_bind_unseparated(parent_name);
        changed = true;
    }

    if let Some(parent_phone) = payload.parent_phone {
        separated.push("parent_phone = ");
        separated.push_bind_unseparated(parent_phone);
        changed = true;
    }

    if let Some(notes) = payload.notes {
        separated.push("notes = ");
        separated.push_bind_unseparated(clean_optional(Some(notes.as_str())));
        changed = true;
    }

    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status);
        changed = true;
    }

    if !changed {
        return Ok(Json(current));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(&id);
    builder.push(format!(" RETURNING {}", STUDENT_COLUMNS));

    let student = builder
        .build_query_as::<Student>()
        .fetch_one(&mut *conn)
        .await
        .map_err(duplicate_email)?;

    tracing::info!("Student {} updated by {}", id, ctx.teacher_id);
    Ok(Json(student))
}

/// Deletes a student with schedules, assignments and progress in one transaction.
pub async fn delete_student(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    ctx.student(&mut tx, &id).await?;
    purge_student(&mut tx, &id).await.map_err(|e| {
        tracing::error!("Failed to delete student {}: {:?}", id, e);
        e
    })?;

    tx.commit().await?;

    tracing::info!("Student {} deleted by {}", id, ctx.teacher_id);
    Ok(StatusCode::NO_CONTENT)
}
