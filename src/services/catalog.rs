// src/services/catalog.rs

//! Loaders shared by several handlers: resource link trees, question counts
//! and the student progress report.

use std::collections::HashMap;

use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{
        assignment::{AssignmentRow, QuestionCountRow, QuestionCounts, QuestionTarget},
        progress::StudentProgress,
        resource::{LessonLink, LessonLinkRow, Resource, ResourceWithLinks, TopicLink, TopicLinkRow},
    },
    services::progress::{StudentProgressReport, build_report},
};

/// Every resource of a teacher with its lesson and topic links.
pub async fn load_resources_with_links(
    conn: &mut SqliteConnection,
    teacher_id: &str,
) -> Result<Vec<ResourceWithLinks>, AppError> {
    let resources = sqlx::query_as::<_, Resource>(
        "SELECT id, teacher_id, name, description, created_at
         FROM resources WHERE teacher_id = ? ORDER BY name, id",
    )
    .bind(teacher_id)
    .fetch_all(&mut *conn)
    .await?;

    let lesson_rows = sqlx::query_as::<_, LessonLinkRow>(
        "SELECT rl.resource_id, rl.lesson_id, l.name AS lesson_name
         FROM resource_lessons rl
         JOIN resources r ON r.id = rl.resource_id
         JOIN lessons l ON l.id = rl.lesson_id
         WHERE r.teacher_id = ?
         ORDER BY l.name, l.id",
    )
    .bind(teacher_id)
    .fetch_all(&mut *conn)
    .await?;

    let topic_rows = sqlx::query_as::<_, TopicLinkRow>(
        "SELECT rt.resource_id, rt.lesson_id, rt.topic_id, t.name AS topic_name, rt.question_count
         FROM resource_topics rt
         JOIN resources r ON r.id = rt.resource_id
         JOIN lesson_topics t ON t.id = rt.topic_id
         WHERE r.teacher_id = ?
         ORDER BY t.sort_order, t.id",
    )
    .bind(teacher_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(assemble_links(resources, lesson_rows, topic_rows))
}

/// Nests link rows under their resources. Topic links whose lesson link is
/// missing are dropped.
pub fn assemble_links(
    resources: Vec<Resource>,
    lesson_rows: Vec<LessonLinkRow>,
    topic_rows: Vec<TopicLinkRow>,
) -> Vec<ResourceWithLinks> {
    let mut lessons_by_resource: HashMap<String, Vec<LessonLink>> = HashMap::new();
    for row in lesson_rows {
        lessons_by_resource
            .entry(row.resource_id)
            .or_default()
            .push(LessonLink {
                lesson_id: row.lesson_id,
                lesson_name: row.lesson_name,
                topics: Vec::new(),
            });
    }

    for row in topic_rows {
        let Some(links) = lessons_by_resource.get_mut(&row.resource_id) else {
            continue;
        };
        if let Some(link) = links.iter_mut().find(|l| l.lesson_id == row.lesson_id) {
            link.topics.push(TopicLink {
                topic_id: row.topic_id,
                topic_name: row.topic_name,
                question_count: row.question_count,
            });
        }
    }

    resources
        .into_iter()
        .map(|resource| {
            let lessons = lessons_by_resource.remove(&resource.id).unwrap_or_default();
            ResourceWithLinks { resource, lessons }
        })
        .collect()
}

/// Groups question-count rows per assignment.
pub fn group_counts(rows: Vec<QuestionCountRow>) -> HashMap<String, QuestionCounts> {
    let mut grouped: HashMap<String, QuestionCounts> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.assignment_id)
            .or_default()
            .0
            .push(QuestionTarget {
                resource_id: row.resource_id,
                student_id: row.student_id,
                count: row.count,
            });
    }
    grouped
}

/// Question counts of every assignment of a student.
pub async fn load_student_counts(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> Result<HashMap<String, QuestionCounts>, AppError> {
    let rows = sqlx::query_as::<_, QuestionCountRow>(
        "SELECT qc.assignment_id, qc.resource_id, qc.student_id, qc.count
         FROM assignment_question_counts qc
         JOIN student_assignments a ON a.id = qc.assignment_id
         WHERE a.student_id = ?
         ORDER BY qc.resource_id, qc.student_id",
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(group_counts(rows))
}

/// Assignments of a student joined with topic and lesson, in display order.
pub async fn load_assignment_rows(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> Result<Vec<AssignmentRow>, AppError> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT a.id, a.student_id, a.topic_id, t.name AS topic_name, t.sort_order AS topic_order,
                l.id AS lesson_id, l.name AS lesson_name, l.group_label, l.color, a.completed
         FROM student_assignments a
         JOIN lesson_topics t ON t.id = a.topic_id
         JOIN lessons l ON l.id = t.lesson_id
         WHERE a.student_id = ?
         ORDER BY l.name, l.id, t.sort_order",
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Replaces the stored targets of one assignment.
pub async fn replace_question_counts(
    conn: &mut SqliteConnection,
    assignment_id: &str,
    counts: &QuestionCounts,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM assignment_question_counts WHERE assignment_id = ?")
        .bind(assignment_id)
        .execute(&mut *conn)
        .await?;

    for target in counts.iter() {
        sqlx::query(
            "INSERT INTO assignment_question_counts (assignment_id, resource_id, student_id, count)
             VALUES (?, ?, ?, ?)",
        )
        .bind(assignment_id)
        .bind(&target.resource_id)
        .bind(&target.student_id)
        .bind(target.count)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Whether `resource_id` is linked to `topic_id`.
pub async fn resource_covers_topic(
    conn: &mut SqliteConnection,
    resource_id: &str,
    topic_id: &str,
) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM resource_topics WHERE resource_id = ? AND topic_id = ? LIMIT 1",
    )
    .bind(resource_id)
    .bind(topic_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(found.is_some())
}

/// Rejects targets naming another student or a resource that does not cover the topic.
pub async fn check_question_counts(
    conn: &mut SqliteConnection,
    counts: &QuestionCounts,
    topic_id: &str,
    student_id: &str,
) -> Result<(), AppError> {
    for target in counts.iter() {
        if target.student_id != student_id {
            return Err(AppError::BadRequest(format!(
                "questionCounts may only target student '{}'",
                student_id
            )));
        }
        if !resource_covers_topic(conn, &target.resource_id, topic_id).await? {
            return Err(AppError::BadRequest(format!(
                "Resource '{}' is not linked to this topic",
                target.resource_id
            )));
        }
    }
    Ok(())
}

/// Builds the full progress report of one student.
pub async fn load_student_report(
    conn: &mut SqliteConnection,
    teacher_id: &str,
    student_id: &str,
) -> Result<StudentProgressReport, AppError> {
    let assignments = load_assignment_rows(conn, student_id).await?;
    let counts = load_student_counts(conn, student_id).await?;

    let progress = sqlx::query_as::<_, StudentProgress>(
        "SELECT id, student_id, assignment_id, resource_id, solved_count, updated_at
         FROM student_progress WHERE student_id = ?",
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    let resources = load_resources_with_links(conn, teacher_id).await?;

    Ok(build_report(
        student_id,
        &assignments,
        &counts,
        &progress,
        &resources,
    ))
}
