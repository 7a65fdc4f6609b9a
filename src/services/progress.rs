// src/services/progress.rs

//! Target/solved rollups for a student's assignments.
//!
//! Everything here is pure: handlers load the rows, these functions shape them.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{
    assignment::{AssignmentRow, QuestionCounts},
    progress::StudentProgress,
    resource::{ResourceWithLinks, TopicResource},
};

/// Resources covering `topic_id`, one entry per resource.
///
/// A resource linked to the topic through several lesson links contributes
/// the sum of those links' question counts. Order is first appearance.
pub fn resources_for_topic(topic_id: &str, resources: &[ResourceWithLinks]) -> Vec<TopicResource> {
    let mut result: Vec<TopicResource> = Vec::new();
    for resource in resources {
        for lesson in &resource.lessons {
            for topic in lesson.topics.iter().filter(|t| t.topic_id == topic_id) {
                match result
                    .iter_mut()
                    .find(|entry| entry.resource_id == resource.resource.id)
                {
                    Some(entry) => entry.question_count += topic.question_count,
                    None => result.push(TopicResource {
                        resource_id: resource.resource.id.clone(),
                        resource_name: resource.resource.name.clone(),
                        question_count: topic.question_count,
                    }),
                }
            }
        }
    }
    result
}

/// `round(100 * completed / target)`, or 0 when there is no target.
pub fn percentage(completed: i64, target: i64) -> i64 {
    if target == 0 {
        return 0;
    }
    (completed as f64 * 100.0 / target as f64).round() as i64
}

/// Target questions of one assignment over the topic's resources.
pub fn assignment_target(counts: &QuestionCounts, topic_resources: &[TopicResource]) -> i64 {
    topic_resources
        .iter()
        .map(|r| counts.total_for_resource(&r.resource_id))
        .sum()
}

/// Solved count recorded for (assignment, resource), zero when absent.
pub fn solved_for(progress: &[StudentProgress], assignment_id: &str, resource_id: &str) -> i64 {
    progress
        .iter()
        .find(|p| p.assignment_id == assignment_id && p.resource_id == resource_id)
        .map(|p| p.solved_count)
        .unwrap_or(0)
}

/// Completed questions of one assignment over the topic's resources.
pub fn assignment_completed(
    progress: &[StudentProgress],
    assignment_id: &str,
    topic_resources: &[TopicResource],
) -> i64 {
    topic_resources
        .iter()
        .map(|r| solved_for(progress, assignment_id, &r.resource_id))
        .sum()
}

/// Additive target/completed pair with its derived percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub target: i64,
    pub completed: i64,
    pub percentage: i64,
}

impl Tally {
    pub fn new(target: i64, completed: i64) -> Self {
        Self {
            target,
            completed,
            percentage: percentage(completed, target),
        }
    }

    pub fn add(self, other: Tally) -> Self {
        Tally::new(self.target + other.target, self.completed + other.completed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProgress {
    pub resource_id: String,
    pub resource_name: String,
    /// Questions the resource offers for the topic.
    pub available: i64,
    pub target: i64,
    pub solved: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub assignment_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub order: i64,
    pub assignment_completed: bool,
    #[serde(flatten)]
    pub tally: Tally,
    pub resources: Vec<ResourceProgress>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub lesson_id: String,
    pub lesson_name: String,
    pub group_label: String,
    pub color: String,
    #[serde(flatten)]
    pub tally: Tally,
    pub topics: Vec<TopicProgress>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgressReport {
    pub student_id: String,
    pub overall: Tally,
    pub lessons: Vec<LessonProgress>,
}

impl StudentProgressReport {
    /// Finds the rollup of one assignment by its topic.
    pub fn topic(&self, topic_id: &str) -> Option<&TopicProgress> {
        self.lessons
            .iter()
            .flat_map(|l| l.topics.iter())
            .find(|t| t.topic_id == topic_id)
    }
}

/// Builds per-topic, per-lesson and overall rollups for one student.
///
/// `assignments` should already be sorted for display; lessons keep the order
/// of their first assignment.
pub fn build_report(
    student_id: &str,
    assignments: &[AssignmentRow],
    counts: &HashMap<String, QuestionCounts>,
    progress: &[StudentProgress],
    resources: &[ResourceWithLinks],
) -> StudentProgressReport {
    let empty = QuestionCounts::default();
    let mut lessons: Vec<LessonProgress> = Vec::new();

    for assignment in assignments {
        let topic_resources = resources_for_topic(&assignment.topic_id, resources);
        let assignment_counts = counts.get(&assignment.id).unwrap_or(&empty);

        let tally = Tally::new(
            assignment_target(assignment_counts, &topic_resources),
            assignment_completed(progress, &assignment.id, &topic_resources),
        );

        let resource_rows = topic_resources
            .iter()
            .map(|r| ResourceProgress {
                resource_id: r.resource_id.clone(),
                resource_name: r.resource_name.clone(),
                available: r.question_count,
                target: assignment_counts.total_for_resource(&r.resource_id),
                solved: solved_for(progress, &assignment.id, &r.resource_id),
            })
            .collect();

        let topic = TopicProgress {
            assignment_id: assignment.id.clone(),
            topic_id: assignment.topic_id.clone(),
            topic_name: assignment.topic_name.clone(),
            order: assignment.topic_order,
            assignment_completed: assignment.completed,
            tally,
            resources: resource_rows,
        };

        match lessons.iter_mut().find(|l| l.lesson_id == assignment.lesson_id) {
            Some(lesson) => {
                lesson.tally = lesson.tally.add(tally);
                lesson.topics.push(topic);
            }
            None => lessons.push(LessonProgress {
                lesson_id: assignment.lesson_id.clone(),
                lesson_name: assignment.lesson_name.clone(),
                group_label: assignment.group_label.clone(),
                color: assignment.color.clone(),
                tally,
                topics: vec![topic],
            }),
        }
    }

    let overall = lessons
        .iter()
        .fold(Tally::default(), |acc, lesson| acc.add(lesson.tally));

    StudentProgressReport {
        student_id: student_id.to_string(),
        overall,
        lessons,
    }
}
