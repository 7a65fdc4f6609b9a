// tests/curriculum_tests.rs

mod common;

use common::{id_of, lesson_with_topics, spawn_app, teacher_session};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn topic_names(topics: &Value) -> Vec<(String, i64)> {
    topics
        .as_array()
        .unwrap()
        .iter()
        .map(|t| {
            (
                t["name"].as_str().unwrap().to_string(),
                t["order"].as_i64().unwrap(),
            )
        })
        .collect()
}

fn pairs(v: &[(&str, i64)]) -> Vec<(String, i64)> {
    v.iter().map(|(n, o)| (n.to_string(), *o)).collect()
}

#[tokio::test]
async fn lessons_get_distinct_palette_colors() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;

    let first = teacher
        .create(
            "/api/lessons",
            json!({ "name": "Matematik", "groupLabel": "Sayısal", "examType": "TYT" }),
        )
        .await;
    let second = teacher
        .create(
            "/api/lessons",
            json!({ "name": "Fizik", "groupLabel": "Sayısal", "examType": "TYT" }),
        )
        .await;
    let custom = teacher
        .create(
            "/api/lessons",
            json!({ "name": "Tarih", "groupLabel": "Sözel", "examType": "TYT", "color": "#123456" }),
        )
        .await;

    assert_eq!(first["color"], "#3B82F6");
    assert_eq!(second["color"], "#10B981");
    assert_eq!(custom["color"], "#123456");

    let response = teacher
        .post(
            "/api/lessons",
            json!({ "name": "Kimya", "groupLabel": "Sayısal", "examType": "TYT", "color": "red" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_lessons_never_share_a_palette_color() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;

    let body = |name: &str| json!({ "name": name, "groupLabel": "Sayısal", "examType": "TYT" });
    let (a, b, c) = tokio::join!(
        teacher.create("/api/lessons", body("Matematik")),
        teacher.create("/api/lessons", body("Fizik")),
        teacher.create("/api/lessons", body("Kimya")),
    );

    let mut colors: Vec<String> = [a, b, c]
        .iter()
        .map(|lesson| lesson["color"].as_str().unwrap().to_string())
        .collect();
    colors.sort();
    colors.dedup();
    assert_eq!(colors.len(), 3);
}

#[tokio::test]
async fn lesson_update_is_partial() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (lesson_id, _) = lesson_with_topics(&teacher, "Matematik", &[]).await;

    let response = teacher
        .put(
            &format!("/api/lessons/{}", lesson_id),
            json!({ "examType": "AYT" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let lesson: Value = response.json().await.unwrap();
    assert_eq!(lesson["name"], "Matematik");
    assert_eq!(lesson["examType"], "AYT");
}

#[tokio::test]
async fn topics_are_appended_in_order() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (lesson_id, _) = lesson_with_topics(&teacher, "Matematik", &["Limit", "Türev", "İntegral"]).await;

    let topics = teacher
        .fetch(&format!("/api/lessons/{}/topics", lesson_id))
        .await;
    assert_eq!(
        topic_names(&topics),
        pairs(&[("Limit", 1), ("Türev", 2), ("İntegral", 3)])
    );
}

#[tokio::test]
async fn reorder_sets_order_to_submitted_positions() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (lesson_id, ids) = lesson_with_topics(&teacher, "Matematik", &["A", "B", "C", "D"]).await;

    let permutation = vec![ids[2].clone(), ids[0].clone(), ids[3].clone(), ids[1].clone()];
    let response = teacher
        .put(
            &format!("/api/lessons/{}/topics/reorder", lesson_id),
            json!({ "ids": permutation }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let topics = teacher
        .fetch(&format!("/api/lessons/{}/topics", lesson_id))
        .await;
    assert_eq!(
        topic_names(&topics),
        pairs(&[("C", 1), ("A", 2), ("D", 3), ("B", 4)])
    );
}

#[tokio::test]
async fn reorder_rejects_non_permutations_without_changes() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (lesson_id, ids) = lesson_with_topics(&teacher, "Matematik", &["A", "B", "C"]).await;
    let path = format!("/api/lessons/{}/topics/reorder", lesson_id);

    for bad in [
        json!({ "ids": [ids[0], ids[1]] }),
        json!({ "ids": [ids[0], ids[0], ids[1]] }),
        json!({ "ids": [ids[0], ids[1], "someone-else"] }),
    ] {
        let response = teacher.put(&path, bad).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let topics = teacher
        .fetch(&format!("/api/lessons/{}/topics", lesson_id))
        .await;
    assert_eq!(topic_names(&topics), pairs(&[("A", 1), ("B", 2), ("C", 3)]));
}

#[tokio::test]
async fn move_and_delete_keep_orders_dense() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (lesson_id, ids) = lesson_with_topics(&teacher, "Matematik", &["A", "B", "C", "D"]).await;

    let response = teacher
        .put(&format!("/api/topics/{}/move", ids[0]), json!({ "position": 3 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let topics: Value = response.json().await.unwrap();
    assert_eq!(
        topic_names(&topics),
        pairs(&[("B", 1), ("C", 2), ("A", 3), ("D", 4)])
    );

    let response = teacher.delete(&format!("/api/topics/{}", ids[2])).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let topics = teacher
        .fetch(&format!("/api/lessons/{}/topics", lesson_id))
        .await;
    assert_eq!(topic_names(&topics), pairs(&[("B", 1), ("A", 2), ("D", 3)]));

    // A new topic still lands at the end
    teacher
        .create(
            &format!("/api/lessons/{}/topics", lesson_id),
            json!({ "name": "E" }),
        )
        .await;
    let topics = teacher
        .fetch(&format!("/api/lessons/{}/topics", lesson_id))
        .await;
    assert_eq!(
        topic_names(&topics),
        pairs(&[("B", 1), ("A", 2), ("D", 3), ("E", 4)])
    );
}

#[tokio::test]
async fn resource_links_filter_topics_per_lesson() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (math, math_topics) = lesson_with_topics(&teacher, "Matematik", &["Limit", "Türev"]).await;
    let (_physics, physics_topics) = lesson_with_topics(&teacher, "Fizik", &["Hareket"]).await;

    // The physics topic is submitted without its lesson and must be dropped
    let resource = teacher
        .create(
            "/api/resources",
            json!({
                "name": "Kaynak A",
                "description": "<p>Soru bankası</p><script>alert(1)</script>",
                "lessonIds": [math],
                "topicIds": [math_topics[1], physics_topics[0]],
                "topicQuestionCounts": { math_topics[1].clone(): 20 }
            }),
        )
        .await;

    assert_eq!(resource["description"], "<p>Soru bankası</p>");
    let lessons = resource["lessons"].as_array().unwrap();
    assert_eq!(lessons.len(), 1);
    let topics = lessons[0]["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["topicId"], math_topics[1].as_str());
    assert_eq!(topics[0]["questionCount"], 20);

    let for_topic = teacher
        .fetch(&format!("/api/topics/{}/resources", math_topics[1]))
        .await;
    assert_eq!(
        for_topic,
        json!([{ "resourceId": id_of(&resource), "resourceName": "Kaynak A", "questionCount": 20 }])
    );
    let none = teacher
        .fetch(&format!("/api/topics/{}/resources", math_topics[0]))
        .await;
    assert_eq!(none, json!([]));
}

#[tokio::test]
async fn resource_put_with_empty_lessons_drops_all_links() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (math, math_topics) = lesson_with_topics(&teacher, "Matematik", &["Türev"]).await;

    let resource = teacher
        .create(
            "/api/resources",
            json!({
                "name": "Kaynak A",
                "lessonIds": [math],
                "topicIds": [math_topics[0]],
                "topicQuestionCounts": { math_topics[0].clone(): 20 }
            }),
        )
        .await;
    let resource_id = id_of(&resource);

    let response = teacher
        .put(
            &format!("/api/resources/{}", resource_id),
            json!({ "name": "Kaynak A (2. baskı)", "lessonIds": [], "topicIds": [] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "Kaynak A (2. baskı)");
    assert_eq!(updated["lessons"], json!([]));

    let for_topic = teacher
        .fetch(&format!("/api/topics/{}/resources", math_topics[0]))
        .await;
    assert_eq!(for_topic, json!([]));
}

#[tokio::test]
async fn resource_cannot_link_foreign_lesson() {
    let address = spawn_app().await;
    let owner = teacher_session(&address).await;
    let other = teacher_session(&address).await;
    let (foreign_lesson, _) = lesson_with_topics(&owner, "Matematik", &["Türev"]).await;

    let response = other
        .post(
            "/api/resources",
            json!({ "name": "Kaynak B", "lessonIds": [foreign_lesson] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The failed transaction left nothing behind
    let resources = other.fetch("/api/resources").await;
    assert_eq!(resources, json!([]));
}

#[tokio::test]
async fn lesson_delete_cascades() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (math, math_topics) = lesson_with_topics(&teacher, "Matematik", &["Limit", "Türev"]).await;
    let (physics, physics_topics) = lesson_with_topics(&teacher, "Fizik", &["Hareket"]).await;

    let resource = teacher
        .create(
            "/api/resources",
            json!({
                "name": "Kaynak A",
                "lessonIds": [math, physics],
                "topicIds": [math_topics[0], math_topics[1], physics_topics[0]],
                "topicQuestionCounts": {
                    math_topics[0].clone(): 10,
                    physics_topics[0].clone(): 5
                }
            }),
        )
        .await;
    let resource_id = id_of(&resource);

    let student = teacher
        .create("/api/students", json!({ "name": "Ali" }))
        .await;
    let student_id = id_of(&student);
    for topic in [&math_topics[0], &physics_topics[0]] {
        teacher
            .create(
                "/api/assignments",
                json!({ "studentId": student_id, "topicId": topic }),
            )
            .await;
    }

    let response = teacher.delete(&format!("/api/lessons/{}", math)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = teacher.get(&format!("/api/lessons/{}", math)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = teacher.get(&format!("/api/topics/{}", math_topics[0])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Only the physics link survives on the resource
    let resource = teacher
        .fetch(&format!("/api/resources/{}", resource_id))
        .await;
    let lessons = resource["lessons"].as_array().unwrap();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0]["lessonId"], physics.as_str());

    // And only the physics assignment survives on the student
    let assignments = teacher
        .fetch(&format!("/api/assignments?studentId={}", student_id))
        .await;
    let assignments = assignments.as_array().unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0]["topicId"], physics_topics[0].as_str());
}

#[tokio::test]
async fn resource_delete_removes_it_everywhere() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (math, math_topics) = lesson_with_topics(&teacher, "Matematik", &["Türev"]).await;

    let resource = teacher
        .create(
            "/api/resources",
            json!({ "name": "Kaynak A", "lessonIds": [math], "topicIds": [math_topics[0]] }),
        )
        .await;
    let resource_id = id_of(&resource);

    let response = teacher.delete(&format!("/api/resources/{}", resource_id)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = teacher.get(&format!("/api/resources/{}", resource_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let resources = teacher.fetch("/api/resources").await;
    assert_eq!(resources, json!([]));
}
