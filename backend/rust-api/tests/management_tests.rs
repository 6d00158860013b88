use axum::http::StatusCode;

mod common;
use common::{create_question, create_test_app, get, seed_classroom, signup};

#[tokio::test]
async fn test_management_is_manager_only() {
    let app = create_test_app();
    let room = seed_classroom(&app, "deny").await;

    for uri in [
        "/api/management/overview",
        "/api/management/teachers",
        "/api/management/students",
        "/api/management/classes",
        "/api/management/lessons",
    ] {
        let (status, _) = get(&app, uri, &room.teacher_token).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_platform_overview_counts() {
    let app = create_test_app();
    seed_classroom(&app, "ov").await;
    let (_, manager) = signup(&app, "chief", "manager").await;

    let (status, overview) = get(&app, "/api/management/overview", &manager).await;

    assert_eq!(status, StatusCode::OK, "{}", overview);
    assert_eq!(overview["total_teachers"], 1);
    assert_eq!(overview["total_students"], 1);
    assert_eq!(overview["total_classes"], 1);
    assert_eq!(overview["total_lessons"], 1);
    assert_eq!(overview["active_students_today"], 0);
    assert_eq!(overview["average_mastery_score"], 0.0);
}

#[tokio::test]
async fn test_platform_listings() {
    let app = create_test_app();
    let room = seed_classroom(&app, "ls").await;
    create_question(&app, &room, "H2O is?", "water", "easy").await;
    let (_, manager) = signup(&app, "director", "manager").await;

    let (status, teachers) = get(&app, "/api/management/teachers", &manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teachers[0]["class_count"], 1);
    assert_eq!(teachers[0]["student_count"], 1);

    let (status, students) = get(&app, "/api/management/students", &manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(students[0]["class_name"], "Grade 7");
    assert_eq!(students[0]["teacher_name"], "ls_teacher Test");

    let (status, classes) = get(&app, "/api/management/classes", &manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(classes[0]["course_count"], 1);

    let (status, lessons) = get(&app, "/api/management/lessons", &manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lessons[0]["unit_name"], "Matter");
    assert_eq!(lessons[0]["class_name"], "Grade 7");
    assert_eq!(lessons[0]["question_count"], 1);
}
