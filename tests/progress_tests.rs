// tests/progress_tests.rs

mod common;

use common::{
    Session, admin_session, id_of, lesson_with_topics, spawn_app, student_session,
    teacher_session, unique_email,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn topic_report<'a>(details: &'a Value, topic_id: &str) -> &'a Value {
    details["progress"]["lessons"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|l| l["topics"].as_array().unwrap().iter())
        .find(|t| t["topicId"] == topic_id)
        .expect("topic in report")
}

/// Lesson "Matematik" with topic "Türev", resource "Kaynak A" offering 20
/// questions on it, and student "Ali". Returns (topic, resource, student).
async fn seed(teacher: &Session, student_body: Value) -> (String, String, String) {
    let (lesson_id, topics) = lesson_with_topics(teacher, "Matematik", &["Türev"]).await;
    let topic_id = topics[0].clone();

    let resource = teacher
        .create(
            "/api/resources",
            json!({
                "name": "Kaynak A",
                "lessonIds": [lesson_id],
                "topicIds": [topic_id],
                "topicQuestionCounts": { topic_id.clone(): 20 }
            }),
        )
        .await;

    let student = teacher.create("/api/students", student_body).await;
    (topic_id, id_of(&resource), id_of(&student))
}

#[tokio::test]
async fn end_to_end_progress_report() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (topic_id, resource_id, student_id) = seed(&teacher, json!({ "name": "Ali" })).await;

    let topic = teacher.fetch(&format!("/api/topics/{}", topic_id)).await;
    assert_eq!(topic["order"], 1);

    let assignment = teacher
        .create(
            "/api/assignments",
            json!({
                "studentId": student_id,
                "topicId": topic_id,
                "questionCounts": { resource_id.clone(): { student_id.clone(): 10 } }
            }),
        )
        .await;
    assert_eq!(
        assignment["questionCounts"],
        json!({ resource_id.clone(): { student_id.clone(): 10 } })
    );
    let assignment_id = id_of(&assignment);

    let response = teacher
        .put(
            "/api/student-progress",
            json!({ "assignmentId": assignment_id, "resourceId": resource_id, "solvedCount": 3 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let details = teacher.fetch(&format!("/api/students/{}", student_id)).await;
    assert_eq!(details["name"], "Ali");
    let report = topic_report(&details, &topic_id);
    assert_eq!(report["target"], 10);
    assert_eq!(report["completed"], 3);
    assert_eq!(report["percentage"], 30);
    assert_eq!(details["progress"]["overall"]["percentage"], 30);
}

#[tokio::test]
async fn percentage_rounds_and_zero_target_is_zero() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (topic_id, resource_id, student_id) = seed(&teacher, json!({ "name": "Ali" })).await;

    let assignment = teacher
        .create(
            "/api/assignments",
            json!({ "studentId": student_id, "topicId": topic_id }),
        )
        .await;
    let assignment_id = id_of(&assignment);

    // No targets yet: 0%, no division error
    let details = teacher.fetch(&format!("/api/students/{}", student_id)).await;
    let report = topic_report(&details, &topic_id);
    assert_eq!(report["target"], 0);
    assert_eq!(report["percentage"], 0);

    let response = teacher
        .put(
            &format!("/api/assignments/{}", assignment_id),
            json!({ "questionCounts": { resource_id.clone(): { student_id.clone(): 7 } } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    teacher
        .put(
            "/api/student-progress",
            json!({ "assignmentId": assignment_id, "resourceId": resource_id, "solvedCount": 2 }),
        )
        .await;

    let details = teacher.fetch(&format!("/api/students/{}", student_id)).await;
    assert_eq!(topic_report(&details, &topic_id)["percentage"], 29);
}

#[tokio::test]
async fn students_record_their_own_progress() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let email = unique_email("ali");
    let (topic_id, resource_id, student_id) = seed(
        &teacher,
        json!({ "name": "Ali", "email": email, "password": "ogrenci123" }),
    )
    .await;
    let other = teacher
        .create(
            "/api/students",
            json!({ "name": "Veli", "email": unique_email("veli"), "password": "ogrenci123" }),
        )
        .await;

    let assignment = teacher
        .create(
            "/api/assignments",
            json!({
                "studentId": student_id,
                "topicId": topic_id,
                "questionCounts": { resource_id.clone(): { student_id.clone(): 10 } }
            }),
        )
        .await;
    let assignment_id = id_of(&assignment);

    let ali = student_session(&address, &email, "ogrenci123").await;
    assert_eq!(ali.id, student_id);

    let body = json!({ "assignmentId": assignment_id, "resourceId": resource_id });
    let response = ali.post("/api/student-progress/increment", body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = ali
        .post(
            "/api/student-progress/increment",
            json!({ "assignmentId": assignment_id, "resourceId": resource_id, "amount": 4 }),
        )
        .await;
    let progress: Value = response.json().await.unwrap();
    assert_eq!(progress["solvedCount"], 5);

    let mine = ali.fetch("/api/me/progress").await;
    assert_eq!(mine["overall"]["completed"], 5);
    assert_eq!(mine["overall"]["percentage"], 50);

    // Students cannot reach teacher routes
    let response = ali.get("/api/lessons").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Another student cannot touch Ali's assignment
    let other_email = other["email"].as_str().unwrap().to_string();
    let veli = student_session(&address, &other_email, "ogrenci123").await;
    let response = veli.post("/api/student-progress/increment", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn progress_needs_a_resource_linked_to_the_topic() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (topic_id, _resource_id, student_id) = seed(&teacher, json!({ "name": "Ali" })).await;
    let unlinked = teacher
        .create("/api/resources", json!({ "name": "Kaynak B" }))
        .await;

    let assignment = teacher
        .create(
            "/api/assignments",
            json!({ "studentId": student_id, "topicId": topic_id }),
        )
        .await;

    let response = teacher
        .post(
            "/api/student-progress/increment",
            json!({ "assignmentId": id_of(&assignment), "resourceId": id_of(&unlinked) }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = teacher
        .put(
            &format!("/api/assignments/{}", id_of(&assignment)),
            json!({ "questionCounts": { id_of(&unlinked): { student_id.clone(): 5 } } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_assignment_is_conflict() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (topic_id, _, student_id) = seed(&teacher, json!({ "name": "Ali" })).await;
    let body = json!({ "studentId": student_id, "topicId": topic_id });

    teacher.create("/api/assignments", body.clone()).await;
    let response = teacher.post("/api/assignments", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn bulk_question_counts_follow_scope() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (math, math_topics) = lesson_with_topics(&teacher, "Matematik", &["Limit", "Türev"]).await;
    let (_tr, tr_topics) = lesson_with_topics(&teacher, "Türkçe", &["Paragraf"]).await;

    let resource = teacher
        .create(
            "/api/resources",
            json!({
                "name": "Kaynak A",
                "lessonIds": [math],
                "topicIds": [math_topics[0], math_topics[1]]
            }),
        )
        .await;
    let resource_id = id_of(&resource);
    let student = teacher.create("/api/students", json!({ "name": "Ali" })).await;
    let student_id = id_of(&student);

    for topic in math_topics.iter().chain(tr_topics.iter()) {
        teacher
            .create(
                "/api/assignments",
                json!({ "studentId": student_id, "topicId": topic }),
            )
            .await;
    }

    // The Türkçe topic is in scope but the resource does not cover it
    let response = teacher
        .post(
            "/api/assignments/bulk-question-counts",
            json!({
                "studentId": student_id,
                "resourceId": resource_id,
                "count": 15,
                "scope": { "kind": "all" }
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated"], 2);

    let response = teacher
        .post(
            "/api/assignments/bulk-question-counts",
            json!({
                "studentId": student_id,
                "resourceId": resource_id,
                "count": 40,
                "scope": { "kind": "lessonSelected", "lessonId": math, "topicIds": [math_topics[1]] }
            }),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["updated"], 1);

    let assignments = teacher
        .fetch(&format!("/api/assignments?studentId={}", student_id))
        .await;
    let count_for = |topic: &str| -> Value {
        assignments
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["topicId"] == topic)
            .unwrap()["questionCounts"]
            .clone()
    };
    assert_eq!(
        count_for(&math_topics[0]),
        json!({ resource_id.clone(): { student_id.clone(): 15 } })
    );
    assert_eq!(
        count_for(&math_topics[1]),
        json!({ resource_id.clone(): { student_id.clone(): 40 } })
    );
    assert_eq!(count_for(&tr_topics[0]), json!({}));
}

#[tokio::test]
async fn students_are_paginated_and_filtered() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;

    for i in 0..5 {
        let status = if i == 4 { "GRADUATED" } else { "ACTIVE" };
        teacher
            .create(
                "/api/students",
                json!({ "name": format!("Öğrenci {}", i), "status": status }),
            )
            .await;
    }
    teacher
        .create("/api/students", json!({ "name": "Zehra", "notes": "<b>çalışkan</b>" }))
        .await;

    let page = teacher.fetch("/api/students?page=2&limit=2").await;
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        page["pagination"],
        json!({ "page": 2, "limit": 2, "totalCount": 6, "totalPages": 3 })
    );

    let graduated = teacher.fetch("/api/students?status=GRADUATED").await;
    assert_eq!(graduated["pagination"]["totalCount"], 1);

    let search = teacher.fetch("/api/students?q=zeh").await;
    assert_eq!(search["data"][0]["name"], "Zehra");
    assert_eq!(search["data"][0]["notes"], "<b>çalışkan</b>");

    let capped = teacher.fetch("/api/students?limit=1000").await;
    assert_eq!(capped["pagination"]["limit"], 100);

    let response = teacher.get("/api/students?status=SLEEPING").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Another teacher sees none of them
    let other = teacher_session(&address).await;
    let theirs = other.fetch("/api/students").await;
    assert_eq!(theirs["pagination"]["totalCount"], 0);
}

#[tokio::test]
async fn student_delete_removes_assignments() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let (topic_id, _, student_id) = seed(&teacher, json!({ "name": "Ali" })).await;
    let assignment = teacher
        .create(
            "/api/assignments",
            json!({ "studentId": student_id, "topicId": topic_id }),
        )
        .await;

    let response = teacher.delete(&format!("/api/students/{}", student_id)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = teacher
        .put(
            &format!("/api/assignments/{}", id_of(&assignment)),
            json!({ "completed": true }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The topic itself can now be deleted cleanly
    let response = teacher.delete(&format!("/api/topics/{}", topic_id)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn admin_sees_rows_through_their_owner() {
    let address = spawn_app().await;
    let teacher = teacher_session(&address).await;
    let admin = admin_session(&address).await;
    let (topic_id, resource_id, student_id) = seed(&teacher, json!({ "name": "Ali" })).await;

    let assignment = teacher
        .create(
            "/api/assignments",
            json!({
                "studentId": student_id,
                "topicId": topic_id,
                "questionCounts": { resource_id.clone(): { student_id.clone(): 10 } }
            }),
        )
        .await;
    teacher
        .put(
            "/api/student-progress",
            json!({ "assignmentId": id_of(&assignment), "resourceId": resource_id, "solvedCount": 3 }),
        )
        .await;

    // The report is computed against the owning teacher's resources
    let details = admin.fetch(&format!("/api/students/{}", student_id)).await;
    let report = topic_report(&details, &topic_id);
    assert_eq!(report["target"], 10);
    assert_eq!(report["completed"], 3);
    assert_eq!(report["percentage"], 30);

    let resource = admin.fetch(&format!("/api/resources/{}", resource_id)).await;
    assert_eq!(resource["name"], "Kaynak A");
    assert_eq!(resource["lessons"].as_array().unwrap().len(), 1);

    let on_topic = admin
        .fetch(&format!("/api/topics/{}/resources", topic_id))
        .await;
    assert_eq!(on_topic.as_array().unwrap().len(), 1);

    // Linking the admin's own lesson to the teacher's resource is refused
    let (admin_lesson, _) = lesson_with_topics(&admin, "Yönetim", &[]).await;
    let lesson_id = resource["lessons"][0]["lessonId"].as_str().unwrap().to_string();
    let response = admin
        .put(
            &format!("/api/resources/{}", resource_id),
            json!({ "name": "Kaynak A", "lessonIds": [lesson_id, admin_lesson] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let resource = teacher.fetch(&format!("/api/resources/{}", resource_id)).await;
    assert_eq!(resource["lessons"][0]["topics"][0]["questionCount"], 20);

    // A schedule made by the admin belongs to the student's teacher
    let schedule = admin
        .create(
            "/api/schedules",
            json!({
                "studentId": student_id,
                "title": "Plan",
                "startDate": "2025-09-01",
                "endDate": "2025-09-07"
            }),
        )
        .await;
    assert_eq!(schedule["teacherId"], teacher.id.as_str());
    let listed = teacher.fetch("/api/schedules").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let teachers = admin.fetch("/api/admin/teachers").await;
    assert!(
        teachers
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["id"] == teacher.id.as_str())
    );
}
