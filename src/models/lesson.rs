// src/models/lesson.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::topic::Topic;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// Represents the 'lessons' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub teacher_id: String,
    pub name: String,

    /// Grouping label shown in the UI (e.g. "Sayısal").
    pub group_label: String,

    /// Exam-type label (e.g. "TYT").
    pub exam_type: String,

    pub subject: String,

    /// Display color, `#RRGGBB`.
    pub color: String,

    pub created_at: DateTime<Utc>,
}

/// Lesson with its topics in display order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonWithTopics {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub topics: Vec<Topic>,
}

/// DTO for creating a lesson. A missing color is picked from the palette.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub group_label: String,
    #[validate(length(min = 1, max = 50))]
    pub exam_type: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub subject: String,
    #[validate(custom(function = validate_color))]
    pub color: Option<String>,
}

/// DTO for updating a lesson. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub group_label: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub exam_type: Option<String>,
    #[validate(length(max = 100))]
    pub subject: Option<String>,
    #[validate(custom(function = validate_color))]
    pub color: Option<String>,
}

fn validate_color(color: &str) -> Result<(), validator::ValidationError> {
    if !HEX_COLOR.is_match(color) {
        return Err(validator::ValidationError::new("invalid_color"));
    }
    Ok(())
}
