// src/models/topic.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'lesson_topics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub lesson_id: String,
    pub name: String,

    /// 1-based position inside the lesson.
    #[serde(rename = "order")]
    pub sort_order: i64,

    pub average_test_count: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// DTO for creating a topic. The order is assigned by the server.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(range(min = 0, max = 10_000))]
    pub average_test_count: Option<i64>,
}

/// DTO for updating a topic. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTopicRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 10_000))]
    pub average_test_count: Option<i64>,
}

/// Full ordering of a list, as ids in their new order.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReorderRequest {
    #[validate(length(max = 1000))]
    pub ids: Vec<String>,
}

/// Drag of one topic to a new 1-based position within its lesson.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveTopicRequest {
    #[validate(range(min = 1))]
    pub position: i64,
}
