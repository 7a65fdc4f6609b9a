// src/handlers/schedules.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        schedule::{
            AddWeekTopicRequest, CreateScheduleRequest, MoveWeekTopicRequest, ScheduleListParams,
            ScheduleView, UpdateWeekTopicRequest, WeekPlan, WeekPlanView, WeekTopic,
            WeekTopicView, WeeklySchedule,
        },
        topic::ReorderRequest,
    },
    services::{
        access::{TeacherContext, find_assignment},
        cascade::purge_schedule,
        catalog::load_assignment_rows,
        ordering::{
            ensure_permutation, move_item, resequence_week_plan, week_topic_ids, write_week_order,
        },
        schedule::{derive_weeks, distribute},
    },
    utils::{extract::ValidatedJson, new_id},
};

/// Loads a schedule with its weeks and their topics in position order.
async fn schedule_view(
    conn: &mut SqliteConnection,
    schedule: WeeklySchedule,
) -> Result<ScheduleView, AppError> {
    let plans = sqlx::query_as::<_, WeekPlan>(
        "SELECT id, schedule_id, week_number, start_date, end_date
         FROM week_plans WHERE schedule_id = ?
         ORDER BY week_number",
    )
    .bind(&schedule.id)
    .fetch_all(&mut *conn)
    .await?;

    let topics = sqlx::query_as::<_, WeekTopicView>(
        "SELECT wt.id, wt.week_plan_id, wt.assignment_id, wt.position, wt.completed,
                t.id AS topic_id, t.name AS topic_name,
                l.id AS lesson_id, l.name AS lesson_name, l.color
         FROM week_topics wt
         JOIN week_plans p ON p.id = wt.week_plan_id
         JOIN student_assignments a ON a.id = wt.assignment_id
         JOIN lesson_topics t ON t.id = a.topic_id
         JOIN lessons l ON l.id = t.lesson_id
         WHERE p.schedule_id = ?
         ORDER BY wt.position, wt.id",
    )
    .bind(&schedule.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_plan: HashMap<String, Vec<WeekTopicView>> = HashMap::new();
    for topic in topics {
        by_plan.entry(topic.week_plan_id.clone()).or_default().push(topic);
    }

    let weeks = plans
        .into_iter()
        .map(|plan| {
            let topics = by_plan.remove(&plan.id).unwrap_or_default();
            WeekPlanView { plan, topics }
        })
        .collect();

    Ok(ScheduleView { schedule, weeks })
}

async fn insert_week_topic(
    conn: &mut SqliteConnection,
    week_plan_id: &str,
    assignment_id: &str,
    position: i64,
) -> Result<WeekTopic, AppError> {
    let week_topic = sqlx::query_as::<_, WeekTopic>(
        r#"
        INSERT INTO week_topics (id, week_plan_id, assignment_id, position, completed)
        VALUES (?, ?, ?, ?, FALSE)
        RETURNING id, week_plan_id, assignment_id, position, completed
        "#,
    )
    .bind(new_id())
    .bind(week_plan_id)
    .bind(assignment_id)
    .bind(position)
    .fetch_one(&mut *conn)
    .await?;
    Ok(week_topic)
}

/// Lists the teacher's schedules.
///
/// Query params: `studentId` (optional).
pub async fn list_schedules(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Query(params): Query<ScheduleListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, teacher_id, student_id, title, start_date, end_date, created_at
         FROM weekly_schedules WHERE ",
    );

    // A named student lists that student's schedules; otherwise the caller's own.
    match &params.student_id {
        Some(student_id) => {
            ctx.student(&mut conn, student_id).await?;
            builder.push("student_id = ");
            builder.push_bind(student_id);
        }
        None => {
            builder.push("teacher_id = ");
            builder.push_bind(&ctx.teacher_id);
        }
    }

    builder.push(" ORDER BY start_date DESC, created_at DESC");

    let schedules = builder
        .build_query_as::<WeeklySchedule>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(Json(schedules))
}

/// Creates a schedule with one week plan per 7-day range.
///
/// With `autoAssign`, the student's incomplete assignments that sit on no
/// week yet are spread over the weeks in lesson and topic order.
pub async fn create_schedule(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    ValidatedJson(payload): ValidatedJson<CreateScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let weeks = derive_weeks(payload.start_date, payload.end_date)?;

    let mut tx = pool.begin().await?;
    let student = ctx.student(&mut tx, &payload.student_id).await?;

    let schedule = sqlx::query_as::<_, WeeklySchedule>(
        r#"
        INSERT INTO weekly_schedules (id, teacher_id, student_id, title, start_date, end_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id, teacher_id, student_id, title, start_date, end_date, created_at
        "#,
    )
    .bind(new_id())
    .bind(&student.teacher_id)
    .bind(&student.id)
    .bind(payload.title.trim())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create schedule: {:?}", e);
        AppError::from(e)
    })?;

    let mut plan_ids = Vec::with_capacity(weeks.len());
    for week in &weeks {
        let plan_id = new_id();
        sqlx::query(
            "INSERT INTO week_plans (id, schedule_id, week_number, start_date, end_date)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&plan_id)
        .bind(&schedule.id)
        .bind(week.week_number)
        .bind(week.start)
        .bind(week.end)
        .execute(&mut *tx)
        .await?;
        plan_ids.push(plan_id);
    }

    if payload.auto_assign {
        let scheduled_ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT wt.assignment_id
             FROM week_topics wt
             JOIN student_assignments a ON a.id = wt.assignment_id
             WHERE a.student_id = ?",
        )
        .bind(&student.id)
        .fetch_all(&mut *tx)
        .await?;
        let scheduled: HashSet<String> = scheduled_ids.into_iter().collect();

        let pending: Vec<String> = load_assignment_rows(&mut tx, &student.id)
            .await?
            .into_iter()
            .filter(|row| !row.completed && !scheduled.contains(&row.id))
            .map(|row| row.id)
            .collect();

        let assigned = pending.len();
        for (plan_id, bucket) in plan_ids.iter().zip(distribute(pending, plan_ids.len())) {
            for (index, assignment_id) in bucket.iter().enumerate() {
                insert_week_topic(&mut tx, plan_id, assignment_id, index as i64 + 1).await?;
            }
        }
        tracing::debug!("Auto-assigned {} topics over {} weeks", assigned, plan_ids.len());
    }

    let view = schedule_view(&mut tx, schedule).await?;
    tx.commit().await?;

    tracing::info!(
        "Schedule {} ({} weeks) created for student {}",
        view.schedule.id,
        view.weeks.len(),
        student.id
    );
    Ok((StatusCode::CREATED, Json(view)))
}

/// Schedule with nested week plans and week topics.
pub async fn get_schedule(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let schedule = ctx.schedule(&mut conn, &id).await?;
    let view = schedule_view(&mut conn, schedule).await?;
    Ok(Json(view))
}

pub async fn delete_schedule(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    ctx.schedule(&mut tx, &id).await?;
    purge_schedule(&mut tx, &id).await?;

    tx.commit().await?;

    tracing::info!("Schedule {} deleted by {}", id, ctx.teacher_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Appends an assignment to the end of a week.
pub async fn add_week_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(week_plan_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<AddWeekTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (plan, schedule) = ctx.week_plan(&mut tx, &week_plan_id).await?;
    let assignment = find_assignment(&mut tx, &payload.assignment_id).await?;
    if assignment.student_id != schedule.student_id {
        return Err(AppError::BadRequest(
            "Assignment does not belong to the schedule's student".to_string(),
        ));
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM week_topics WHERE week_plan_id = ?")
        .bind(&plan.id)
        .fetch_one(&mut *tx)
        .await?;

    let week_topic = insert_week_topic(&mut tx, &plan.id, &assignment.id, count + 1).await?;
    tx.commit().await?;

    tracing::info!("Assignment {} added to week {}", assignment.id, plan.id);
    Ok((StatusCode::CREATED, Json(week_topic)))
}

pub async fn update_week_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateWeekTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    ctx.week_topic(&mut conn, &id).await?;

    let week_topic = sqlx::query_as::<_, WeekTopic>(
        "UPDATE week_topics SET completed = ? WHERE id = ?
         RETURNING id, week_plan_id, assignment_id, position, completed",
    )
    .bind(payload.completed)
    .bind(&id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Json(week_topic))
}

/// Drags a week topic to a 1-based position, within its week or into
/// another week of the same schedule. Both weeks end up numbered 1..N.
pub async fn move_week_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<MoveWeekTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (week_topic, source, schedule) = ctx.week_topic(&mut tx, &id).await?;
    let (target, _) = ctx.week_plan(&mut tx, &payload.week_plan_id).await?;
    if target.schedule_id != schedule.id {
        return Err(AppError::BadRequest(
            "Week topics can only move within their schedule".to_string(),
        ));
    }

    let to = (payload.position - 1) as usize;
    let mut source_ids = week_topic_ids(&mut tx, &source.id).await?;
    let from = source_ids
        .iter()
        .position(|t| t == &week_topic.id)
        .ok_or_else(|| AppError::NotFound("Week topic not found".to_string()))?;

    if source.id == target.id {
        move_item(&mut source_ids, from, to);
        write_week_order(&mut tx, &source.id, &source_ids).await?;
    } else {
        let moved = source_ids.remove(from);
        let mut target_ids = week_topic_ids(&mut tx, &target.id).await?;
        let to = to.min(target_ids.len());
        target_ids.insert(to, moved);

        write_week_order(&mut tx, &target.id, &target_ids).await?;
        write_week_order(&mut tx, &source.id, &source_ids).await?;
    }

    let view = schedule_view(&mut tx, schedule).await?;
    tx.commit().await?;

    Ok(Json(view))
}

/// Rewrites the order of a week. `ids` must name each of its topics once.
pub async fn reorder_week_topics(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(week_plan_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (plan, schedule) = ctx.week_plan(&mut tx, &week_plan_id).await?;
    let current = week_topic_ids(&mut tx, &plan.id).await?;
    ensure_permutation(&current, &payload.ids)?;
    write_week_order(&mut tx, &plan.id, &payload.ids).await?;

    let view = schedule_view(&mut tx, schedule).await?;
    tx.commit().await?;

    Ok(Json(view))
}

pub async fn delete_week_topic(
    State(pool): State<SqlitePool>,
    ctx: TeacherContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (week_topic, plan, _) = ctx.week_topic(&mut tx, &id).await?;
    sqlx::query("DELETE FROM week_topics WHERE id = ?")
        .bind(&week_topic.id)
        .execute(&mut *tx)
        .await?;
    resequence_week_plan(&mut tx, &plan.id).await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
