// src/models/assignment.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'student_assignments' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignment {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// One target: `count` questions from `resource_id` for `student_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionTarget {
    pub resource_id: String,
    pub student_id: String,
    pub count: i64,
}

/// Per-resource, per-student target counts of one assignment.
///
/// Stored as explicit rows; on the wire it keeps the nested
/// `{ resourceId: { studentId: count } }` shape clients already use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionCounts(pub Vec<QuestionTarget>);

impl QuestionCounts {
    pub fn iter(&self) -> impl Iterator<Item = &QuestionTarget> {
        self.0.iter()
    }

    /// Sum of all per-student counts recorded under one resource.
    pub fn total_for_resource(&self, resource_id: &str) -> i64 {
        self.0
            .iter()
            .filter(|t| t.resource_id == resource_id)
            .map(|t| t.count)
            .sum()
    }

    /// Sets (or inserts) the count for a (resource, student) pair.
    pub fn set(&mut self, resource_id: &str, student_id: &str, count: i64) {
        match self
            .0
            .iter_mut()
            .find(|t| t.resource_id == resource_id && t.student_id == student_id)
        {
            Some(target) => target.count = count,
            None => self.0.push(QuestionTarget {
                resource_id: resource_id.to_string(),
                student_id: student_id.to_string(),
                count,
            }),
        }
    }
}

impl Serialize for QuestionCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut nested: BTreeMap<&str, BTreeMap<&str, i64>> = BTreeMap::new();
        for target in &self.0 {
            nested
                .entry(target.resource_id.as_str())
                .or_default()
                .insert(target.student_id.as_str(), target.count);
        }
        nested.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QuestionCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nested = BTreeMap::<String, BTreeMap<String, i64>>::deserialize(deserializer)?;
        let targets = nested
            .into_iter()
            .flat_map(|(resource_id, per_student)| {
                per_student
                    .into_iter()
                    .map(move |(student_id, count)| QuestionTarget {
                        resource_id: resource_id.clone(),
                        student_id,
                        count,
                    })
            })
            .collect();
        Ok(QuestionCounts(targets))
    }
}

/// Assignment joined with its topic and lesson, as listed to teachers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub topic_order: i64,
    pub lesson_id: String,
    pub lesson_name: String,
    pub group_label: String,
    pub completed: bool,
    pub question_counts: QuestionCounts,
}

/// Joined row backing `AssignmentView` and the progress report.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub topic_order: i64,
    pub lesson_id: String,
    pub lesson_name: String,
    pub group_label: String,
    pub color: String,
    pub completed: bool,
}

/// Question-count row tagged with its assignment.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionCountRow {
    pub assignment_id: String,
    pub resource_id: String,
    pub student_id: String,
    pub count: i64,
}

/// Query parameters for listing assignments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentListParams {
    pub student_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateAssignmentRequest {
    #[validate(length(min = 1))]
    pub student_id: String,
    #[validate(length(min = 1))]
    pub topic_id: String,
    #[validate(custom(function = validate_counts))]
    pub question_counts: Option<QuestionCounts>,
}

/// DTO for updating an assignment. `questionCounts` replaces the whole map.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAssignmentRequest {
    #[validate(custom(function = validate_counts))]
    pub question_counts: Option<QuestionCounts>,
    pub completed: Option<bool>,
}

/// Which topics a bulk question-count change applies to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BulkScope {
    /// Every topic the student is assigned.
    All,
    /// The currently selected topics.
    #[serde(rename_all = "camelCase")]
    Selected { topic_ids: Vec<String> },
    /// Every topic of the lessons carrying this group label.
    #[serde(rename_all = "camelCase")]
    Group { group_label: String },
    /// The selected topics that belong to one lesson.
    #[serde(rename_all = "camelCase")]
    LessonSelected {
        lesson_id: String,
        topic_ids: Vec<String>,
    },
}

/// Overwrites one resource's target count across a scope of the student's assignments.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkQuestionCountsRequest {
    #[validate(length(min = 1))]
    pub student_id: String,
    #[validate(length(min = 1))]
    pub resource_id: String,
    #[validate(range(min = 0, max = 100_000))]
    pub count: i64,
    pub scope: BulkScope,
}

fn validate_counts(counts: &QuestionCounts) -> Result<(), validator::ValidationError> {
    if counts.iter().any(|t| !(0..=100_000).contains(&t.count)) {
        return Err(validator::ValidationError::new("question_count_out_of_range"));
    }
    Ok(())
}
