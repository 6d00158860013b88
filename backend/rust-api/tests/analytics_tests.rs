use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{create_question, create_test_app, get, post, seed_classroom, send, signup};

#[tokio::test]
async fn test_dashboard_without_classes_is_zero() {
    let app = create_test_app();
    let (_, token) = signup(&app, "newbie", "teacher").await;

    let (status, dashboard) = get(&app, "/api/analytics/dashboard", &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["total_students"], 0);
    assert_eq!(dashboard["active_students_today"], 0);
    assert_eq!(dashboard["average_mastery_score"], 0.0);
    assert_eq!(dashboard["total_questions_attempted"], 0);
    assert_eq!(dashboard["completion_rate"], 0.0);
    assert!(dashboard["top_performing_students"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_dashboard_rolls_up_class_activity() {
    let app = create_test_app();
    let room = seed_classroom(&app, "dash").await;
    let question_id = create_question(&app, &room, "H2O is?", "water", "easy").await;

    post(
        &app,
        &format!("/api/practice/questions/{}/answer", question_id),
        &room.student_token,
        json!({ "answer": "water" }),
    )
    .await;
    post(
        &app,
        "/api/activity/sessions",
        &room.student_token,
        json!({ "session_type": "lesson" }),
    )
    .await;
    send(
        &app,
        Method::PUT,
        &format!("/api/activity/progress/{}", room.lesson_id),
        Some(&room.student_token),
        Some(json!({ "completion_percentage": 100.0, "status": "completed" })),
    )
    .await;

    let (status, dashboard) = get(&app, "/api/analytics/dashboard", &room.teacher_token).await;

    assert_eq!(status, StatusCode::OK, "{}", dashboard);
    assert_eq!(dashboard["total_students"], 1);
    assert_eq!(dashboard["active_students_today"], 1);
    assert_eq!(dashboard["average_mastery_score"], 5.0);
    assert_eq!(dashboard["total_questions_attempted"], 1);
    assert_eq!(dashboard["completion_rate"], 100.0);
    assert_eq!(
        dashboard["top_performing_students"][0]["id"],
        room.student_id.as_str()
    );

    let (status, _) = get(&app, "/api/analytics/dashboard", &room.student_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_insight_ownership_and_recommendations() {
    let app = create_test_app();
    let room = seed_classroom(&app, "insight").await;
    let (_, stranger) = signup(&app, "stranger", "teacher").await;

    let uri = format!("/api/analytics/students/{}/insights", room.student_id);

    let (status, insight) = get(&app, &uri, &room.teacher_token).await;
    assert_eq!(status, StatusCode::OK, "{}", insight);
    assert_eq!(insight["student_id"], room.student_id.as_str());
    assert_eq!(insight["progress_rate"], 0.0);
    assert_eq!(insight["recommendations"].as_array().unwrap().len(), 3);

    let (status, _) = get(&app, &uri, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(
        &app,
        &format!("/api/analytics/students/{}/insights", room.teacher_id),
        &room.teacher_token,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_class_progress_per_lesson() {
    let app = create_test_app();
    let room = seed_classroom(&app, "prog").await;

    send(
        &app,
        Method::PUT,
        &format!("/api/activity/progress/{}", room.lesson_id),
        Some(&room.student_token),
        Some(json!({ "completion_percentage": 40.0, "status": "in_progress" })),
    )
    .await;

    let uri = format!("/api/analytics/classes/{}/progress", room.class_id);
    let (status, report) = get(&app, &uri, &room.teacher_token).await;

    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report[0]["lesson_id"], room.lesson_id.as_str());
    assert_eq!(report[0]["average_completion"], 40.0);
    assert_eq!(report[0]["struggling_students"], 1);
    assert_eq!(report[0]["completed_students"], 0);

    let (_, stranger) = signup(&app, "peeker", "teacher").await;
    let (status, _) = get(&app, &uri, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_intervention_lifecycle() {
    let app = create_test_app();
    let room = seed_classroom(&app, "help").await;

    let (status, created) = post(
        &app,
        "/api/analytics/interventions",
        &room.teacher_token,
        json!({
            "student_id": room.student_id,
            "intervention_type": "remedial",
            "description": "Review atomic structure",
            "priority": "high",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["status"], "pending");
    assert!(created["resolved_at"].is_null());
    let uri = format!("/api/analytics/interventions/{}", created["_id"].as_str().unwrap());

    let (status, listed) = get(
        &app,
        "/api/analytics/interventions?status=pending&priority=high",
        &room.teacher_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["student_name"], "help_student Test");

    let (status, listed) = get(
        &app,
        "/api/analytics/interventions?priority=low",
        &room.teacher_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed.as_array().unwrap().is_empty());

    let (status, resolved) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&room.teacher_token),
        Some(json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(resolved["resolved_at"].is_string());

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&room.teacher_token),
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_intervention_for_foreign_student_is_forbidden() {
    let app = create_test_app();
    let room = seed_classroom(&app, "own").await;
    let (_, stranger) = signup(&app, "meddler", "teacher").await;

    let (status, _) = post(
        &app,
        "/api/analytics/interventions",
        &stranger,
        json!({
            "student_id": room.student_id,
            "intervention_type": "attention_needed",
            "description": "Not my student",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
