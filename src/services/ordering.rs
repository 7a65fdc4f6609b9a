// src/services/ordering.rs

use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::error::AppError;

/// Checks that `submitted` is a permutation of `current`.
pub fn ensure_permutation(current: &[String], submitted: &[String]) -> Result<(), AppError> {
    if current.len() != submitted.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} ids, got {}",
            current.len(),
            submitted.len()
        )));
    }

    let known: HashSet<&str> = current.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(submitted.len());
    for id in submitted {
        if !known.contains(id.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown id '{}'", id)));
        }
        if !seen.insert(id.as_str()) {
            return Err(AppError::BadRequest(format!("Duplicate id '{}'", id)));
        }
    }
    Ok(())
}

/// Moves the item at `from` so it ends at `to` (0-based), clamping `to`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() {
        return;
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}

/// Pairs every id with its 1-based position.
pub fn positions(ids: &[String]) -> Vec<(&str, i64)> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i as i64 + 1))
        .collect()
}

/// Topic ids of a lesson in stored order.
pub async fn lesson_topic_ids(
    conn: &mut SqliteConnection,
    lesson_id: &str,
) -> Result<Vec<String>, AppError> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM lesson_topics WHERE lesson_id = ? ORDER BY sort_order, created_at, id",
    )
    .bind(lesson_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Week-topic ids of a week plan in stored order.
pub async fn week_topic_ids(
    conn: &mut SqliteConnection,
    week_plan_id: &str,
) -> Result<Vec<String>, AppError> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM week_topics WHERE week_plan_id = ? ORDER BY position, id",
    )
    .bind(week_plan_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Writes `sort_order` = 1-based index for each topic id.
pub async fn write_topic_order(conn: &mut SqliteConnection, ids: &[String]) -> Result<(), AppError> {
    for (id, position) in positions(ids) {
        sqlx::query("UPDATE lesson_topics SET sort_order = ? WHERE id = ?")
            .bind(position)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Writes `position` = 1-based index for each week topic id, attaching it to `week_plan_id`.
pub async fn write_week_order(
    conn: &mut SqliteConnection,
    week_plan_id: &str,
    ids: &[String],
) -> Result<(), AppError> {
    for (id, position) in positions(ids) {
        sqlx::query("UPDATE week_topics SET position = ?, week_plan_id = ? WHERE id = ?")
            .bind(position)
            .bind(week_plan_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Closes gaps left by deletes: topics become 1..N again.
pub async fn resequence_lesson(conn: &mut SqliteConnection, lesson_id: &str) -> Result<(), AppError> {
    let ids = lesson_topic_ids(conn, lesson_id).await?;
    write_topic_order(conn, &ids).await
}

/// Closes gaps left by deletes: week topics become 1..N again.
pub async fn resequence_week_plan(
    conn: &mut SqliteConnection,
    week_plan_id: &str,
) -> Result<(), AppError> {
    let ids = week_topic_ids(conn, week_plan_id).await?;
    write_week_order(conn, week_plan_id, &ids).await
}
