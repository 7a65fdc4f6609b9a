// src/services/cascade.rs

//! Explicit dependent-row removal. Callers run these inside one transaction.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::error::AppError;
use crate::services::ordering::resequence_week_plan;

/// Runs `prefix` followed by a bound `IN (...)` list. No-op for an empty list.
async fn execute_in(
    conn: &mut SqliteConnection,
    prefix: &str,
    ids: &[String],
) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(prefix);
    builder.push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Selects one text column with a bound `IN (...)` list.
async fn fetch_ids_in(
    conn: &mut SqliteConnection,
    prefix: &str,
    ids: &[String],
) -> Result<Vec<String>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(prefix);
    builder.push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");

    let rows = builder
        .build_query_scalar::<String>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Removes assignments with their week topics, progress and question counts.
/// Week plans that lose topics are re-sequenced.
pub async fn purge_assignments(
    conn: &mut SqliteConnection,
    assignment_ids: &[String],
) -> Result<(), AppError> {
    if assignment_ids.is_empty() {
        return Ok(());
    }

    let mut touched_plans = fetch_ids_in(
        conn,
        "SELECT DISTINCT week_plan_id FROM week_topics WHERE assignment_id",
        assignment_ids,
    )
    .await?;
    touched_plans.sort();
    touched_plans.dedup();

    execute_in(conn, "DELETE FROM week_topics WHERE assignment_id", assignment_ids).await?;
    execute_in(conn, "DELETE FROM student_progress WHERE assignment_id", assignment_ids).await?;
    execute_in(
        conn,
        "DELETE FROM assignment_question_counts WHERE assignment_id",
        assignment_ids,
    )
    .await?;
    execute_in(conn, "DELETE FROM student_assignments WHERE id", assignment_ids).await?;

    for plan_id in &touched_plans {
        resequence_week_plan(conn, plan_id).await?;
    }
    Ok(())
}

/// Removes topics, their assignments and the resource links pointing at them.
pub async fn purge_topics(conn: &mut SqliteConnection, topic_ids: &[String]) -> Result<(), AppError> {
    if topic_ids.is_empty() {
        return Ok(());
    }

    let assignment_ids = fetch_ids_in(
        conn,
        "SELECT id FROM student_assignments WHERE topic_id",
        topic_ids,
    )
    .await?;
    purge_assignments(conn, &assignment_ids).await?;

    execute_in(conn, "DELETE FROM resource_topics WHERE topic_id", topic_ids).await?;
    execute_in(conn, "DELETE FROM lesson_topics WHERE id", topic_ids).await?;
    Ok(())
}

/// Removes a lesson, its topics and every resource link to it.
pub async fn purge_lesson(conn: &mut SqliteConnection, lesson_id: &str) -> Result<(), AppError> {
    let topic_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM lesson_topics WHERE lesson_id = ?")
            .bind(lesson_id)
            .fetch_all(&mut *conn)
            .await?;

    purge_topics(conn, &topic_ids).await?;

    sqlx::query("DELETE FROM resource_topics WHERE lesson_id = ?")
        .bind(lesson_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM resource_lessons WHERE lesson_id = ?")
        .bind(lesson_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM lessons WHERE id = ?")
        .bind(lesson_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Removes all lesson/topic links of a resource, keeping the resource itself.
pub async fn clear_resource_links(
    conn: &mut SqliteConnection,
    resource_id: &str,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM resource_topics WHERE resource_id = ?")
        .bind(resource_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM resource_lessons WHERE resource_id = ?")
        .bind(resource_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Removes a resource with its links, targets and progress rows.
pub async fn purge_resource(conn: &mut SqliteConnection, resource_id: &str) -> Result<(), AppError> {
    for statement in [
        "DELETE FROM student_progress WHERE resource_id = ?",
        "DELETE FROM assignment_question_counts WHERE resource_id = ?",
    ] {
        sqlx::query(statement)
            .bind(resource_id)
            .execute(&mut *conn)
            .await?;
    }
    clear_resource_links(conn, resource_id).await?;
    sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(resource_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Removes a schedule with its week plans and week topics.
pub async fn purge_schedule(conn: &mut SqliteConnection, schedule_id: &str) -> Result<(), AppError> {
    for statement in [
        "DELETE FROM week_topics WHERE week_plan_id IN (SELECT id FROM week_plans WHERE schedule_id = ?)",
        "DELETE FROM week_plans WHERE schedule_id = ?",
        "DELETE FROM weekly_schedules WHERE id = ?",
    ] {
        sqlx::query(statement)
            .bind(schedule_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Removes a student and everything hanging off it.
pub async fn purge_student(conn: &mut SqliteConnection, student_id: &str) -> Result<(), AppError> {
    let schedule_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM weekly_schedules WHERE student_id = ?")
            .bind(student_id)
            .fetch_all(&mut *conn)
            .await?;
    for schedule_id in &schedule_ids {
        purge_schedule(conn, schedule_id).await?;
    }

    let assignment_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM student_assignments WHERE student_id = ?")
            .bind(student_id)
            .fetch_all(&mut *conn)
            .await?;
    purge_assignments(conn, &assignment_ids).await?;

    for statement in [
        "DELETE FROM student_progress WHERE student_id = ?",
        "DELETE FROM assignment_question_counts WHERE student_id = ?",
        "DELETE FROM students WHERE id = ?",
    ] {
        sqlx::query(statement)
            .bind(student_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
