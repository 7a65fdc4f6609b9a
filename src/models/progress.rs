// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'student_progress' table: one row per (assignment, resource).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub id: String,
    pub student_id: String,
    pub assignment_id: String,
    pub resource_id: String,
    pub solved_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// "I solved a question": increments the solved count.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordSolvedRequest {
    #[validate(length(min = 1))]
    pub assignment_id: String,
    #[validate(length(min = 1))]
    pub resource_id: String,
    /// Defaults to 1.
    #[validate(range(min = 1, max = 1000))]
    pub amount: Option<i64>,
}

/// Teacher correction: sets the solved count outright.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetSolvedRequest {
    #[validate(length(min = 1))]
    pub assignment_id: String,
    #[validate(length(min = 1))]
    pub resource_id: String,
    #[validate(range(min = 0, max = 100_000))]
    pub solved_count: i64,
}

/// Query parameters for listing progress rows.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressListParams {
    pub assignment_id: String,
}
