// src/services/access.rs

//! Ownership checks carried through handlers.
//!
//! `TeacherContext` is extracted once from the session claims; its lookups
//! return a row only when it exists (else 404) and belongs to the calling
//! teacher (else 401). Admins pass every ownership check.

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{
        assignment::StudentAssignment,
        lesson::Lesson,
        resource::Resource,
        schedule::{WeekPlan, WeekTopic, WeeklySchedule},
        student::Student,
        topic::Topic,
    },
    utils::jwt::{Claims, ROLE_ADMIN},
};

#[derive(Debug, Clone)]
pub struct TeacherContext {
    pub teacher_id: String,
    pub is_admin: bool,
}

impl<S: Send + Sync> FromRequestParts<S> for TeacherContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;
        TeacherContext::from_claims(claims)
    }
}

fn not_found(kind: &str) -> AppError {
    AppError::NotFound(format!("{} not found", kind))
}

impl TeacherContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, AppError> {
        if !claims.is_teacher() {
            return Err(AppError::Forbidden("Teacher access required".to_string()));
        }
        Ok(TeacherContext {
            teacher_id: claims.sub.clone(),
            is_admin: claims.role == ROLE_ADMIN,
        })
    }

    fn ensure_owner(&self, owner_id: &str) -> Result<(), AppError> {
        if owner_id != self.teacher_id && !self.is_admin {
            return Err(AppError::AuthError("Unauthorized".to_string()));
        }
        Ok(())
    }

    pub async fn lesson(&self, conn: &mut SqliteConnection, id: &str) -> Result<Lesson, AppError> {
        let lesson = sqlx::query_as::<_, Lesson>(
            "SELECT id, teacher_id, name, group_label, exam_type, subject, color, created_at
             FROM lessons WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Lesson"))?;

        self.ensure_owner(&lesson.teacher_id)?;
        Ok(lesson)
    }

    pub async fn topic(&self, conn: &mut SqliteConnection, id: &str) -> Result<Topic, AppError> {
        let topic = sqlx::query_as::<_, Topic>(
            "SELECT id, lesson_id, name, sort_order, average_test_count, created_at
             FROM lesson_topics WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Topic"))?;

        self.lesson(conn, &topic.lesson_id).await?;
        Ok(topic)
    }

    pub async fn resource(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Resource, AppError> {
        let resource = sqlx::query_as::<_, Resource>(
            "SELECT id, teacher_id, name, description, created_at FROM resources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Resource"))?;

        self.ensure_owner(&resource.teacher_id)?;
        Ok(resource)
    }

    pub async fn student(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Student, AppError> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, teacher_id, name, email, password, phone, parent_name, parent_phone,
                    notes, status, created_at
             FROM students WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Student"))?;

        self.ensure_owner(&student.teacher_id)?;
        Ok(student)
    }

    pub async fn assignment(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<StudentAssignment, AppError> {
        let assignment = find_assignment(conn, id).await?;
        self.student(conn, &assignment.student_id).await?;
        Ok(assignment)
    }

    pub async fn schedule(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<WeeklySchedule, AppError> {
        let schedule = sqlx::query_as::<_, WeeklySchedule>(
            "SELECT id, teacher_id, student_id, title, start_date, end_date, created_at
             FROM weekly_schedules WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Schedule"))?;

        self.ensure_owner(&schedule.teacher_id)?;
        Ok(schedule)
    }

    /// Returns the week plan together with the schedule it belongs to.
    pub async fn week_plan(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<(WeekPlan, WeeklySchedule), AppError> {
        let plan = sqlx::query_as::<_, WeekPlan>(
            "SELECT id, schedule_id, week_number, start_date, end_date FROM week_plans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Week plan"))?;

        let schedule = self.schedule(conn, &plan.schedule_id).await?;
        Ok((plan, schedule))
    }

    pub async fn week_topic(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<(WeekTopic, WeekPlan, WeeklySchedule), AppError> {
        let week_topic = sqlx::query_as::<_, WeekTopic>(
            "SELECT id, week_plan_id, assignment_id, position, completed FROM week_topics WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found("Week topic"))?;

        let (plan, schedule) = self.week_plan(conn, &week_topic.week_plan_id).await?;
        Ok((week_topic, plan, schedule))
    }
}

/// Rows combined in one request must share an owner. Only admins, who pass
/// every ownership check, can trip this.
pub fn ensure_same_owner(left: &str, right: &str) -> Result<(), AppError> {
    if left != right {
        return Err(AppError::BadRequest(
            "Rows belong to different teachers".to_string(),
        ));
    }
    Ok(())
}

/// Plain assignment lookup, shared with the student-facing progress path.
pub async fn find_assignment(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<StudentAssignment, AppError> {
    sqlx::query_as::<_, StudentAssignment>(
        "SELECT id, student_id, topic_id, completed, created_at FROM student_assignments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found("Assignment"))
}
