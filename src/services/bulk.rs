// src/services/bulk.rs

use std::collections::HashSet;

use crate::models::assignment::BulkScope;

/// Minimal topic facts needed to resolve a bulk scope.
#[derive(Debug, Clone)]
pub struct ScopedTopic {
    pub topic_id: String,
    pub lesson_id: String,
    pub group_label: String,
}

/// Topic ids matched by `scope` among `topics`.
pub fn select_topics(scope: &BulkScope, topics: &[ScopedTopic]) -> HashSet<String> {
    topics
        .iter()
        .filter(|topic| match scope {
            BulkScope::All => true,
            BulkScope::Selected { topic_ids } => topic_ids.contains(&topic.topic_id),
            BulkScope::Group { group_label } => &topic.group_label == group_label,
            BulkScope::LessonSelected {
                lesson_id,
                topic_ids,
            } => &topic.lesson_id == lesson_id && topic_ids.contains(&topic.topic_id),
        })
        .map(|topic| topic.topic_id.clone())
        .collect()
}
