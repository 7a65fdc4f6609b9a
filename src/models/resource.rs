// src/models/resource.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'resources' table (books, question banks, ...).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub teacher_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A resource with its lesson links, each carrying the topic links under it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceWithLinks {
    #[serde(flatten)]
    pub resource: Resource,
    pub lessons: Vec<LessonLink>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonLink {
    pub lesson_id: String,
    pub lesson_name: String,
    pub topics: Vec<TopicLink>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicLink {
    pub topic_id: String,
    pub topic_name: String,
    /// How many questions the resource offers for the topic.
    pub question_count: i64,
}

/// Joined row from 'resource_lessons'.
#[derive(Debug, FromRow)]
pub struct LessonLinkRow {
    pub resource_id: String,
    pub lesson_id: String,
    pub lesson_name: String,
}

/// Joined row from 'resource_topics'.
#[derive(Debug, FromRow)]
pub struct TopicLinkRow {
    pub resource_id: String,
    pub lesson_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub question_count: i64,
}

/// One aggregated entry of "resources for a topic".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResource {
    pub resource_id: String,
    pub resource_name: String,
    pub question_count: i64,
}

/// DTO for creating or replacing a resource together with its links.
///
/// `topicIds` not belonging to one of `lessonIds` are dropped. Topics without
/// an entry in `topicQuestionCounts` are linked with a count of 0.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpsertResourceRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub lesson_ids: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub topic_ids: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = validate_question_counts))]
    pub topic_question_counts: HashMap<String, i64>,
}

fn validate_question_counts(
    counts: &HashMap<String, i64>,
) -> Result<(), validator::ValidationError> {
    if counts.values().any(|c| !(0..=100_000).contains(c)) {
        return Err(validator::ValidationError::new("question_count_out_of_range"));
    }
    Ok(())
}
