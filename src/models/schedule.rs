// src/models/schedule.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'weekly_schedules' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'week_plans' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPlan {
    pub id: String,
    pub schedule_id: String,
    pub week_number: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Represents the 'week_topics' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekTopic {
    pub id: String,
    pub week_plan_id: String,
    pub assignment_id: String,
    pub position: i64,
    pub completed: bool,
}

/// Week topic joined with the labels of its assignment.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekTopicView {
    pub id: String,
    pub week_plan_id: String,
    pub assignment_id: String,
    pub position: i64,
    pub completed: bool,
    pub topic_id: String,
    pub topic_name: String,
    pub lesson_id: String,
    pub lesson_name: String,
    pub color: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPlanView {
    #[serde(flatten)]
    pub plan: WeekPlan,
    pub topics: Vec<WeekTopicView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: WeeklySchedule,
    pub weeks: Vec<WeekPlanView>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateScheduleRequest {
    #[validate(length(min = 1))]
    pub student_id: String,
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Spread the student's unscheduled, incomplete assignments over the weeks.
    #[serde(default)]
    pub auto_assign: bool,
}

/// Query parameters for listing schedules.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleListParams {
    pub student_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddWeekTopicRequest {
    #[validate(length(min = 1))]
    pub assignment_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateWeekTopicRequest {
    pub completed: bool,
}

/// Drag of a week topic to a 1-based position, possibly in another week.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveWeekTopicRequest {
    #[validate(length(min = 1))]
    pub week_plan_id: String,
    #[validate(range(min = 1))]
    pub position: i64,
}
