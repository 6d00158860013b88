use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{create_question, create_test_app, get, post, seed_classroom, send};

#[tokio::test]
async fn test_next_question_hides_answer_key() {
    let app = create_test_app();
    let room = seed_classroom(&app, "next").await;
    let question_id = create_question(&app, &room, "H2O is?", "water", "easy").await;

    let (status, question) = get(
        &app,
        &format!("/api/practice/questions/next?lesson_id={}", room.lesson_id),
        &room.student_token,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", question);
    assert_eq!(question["id"], question_id.as_str());
    assert!(question.get("correct_answer").is_none());
}

#[tokio::test]
async fn test_next_question_prefers_least_mastered() {
    let app = create_test_app();
    let room = seed_classroom(&app, "least").await;
    let answered = create_question(&app, &room, "Symbol for sodium?", "Na", "easy").await;
    let fresh = create_question(&app, &room, "Symbol for iron?", "Fe", "hard").await;

    let (status, _) = post(
        &app,
        &format!("/api/practice/questions/{}/answer", answered),
        &room.student_token,
        json!({ "answer": "Na", "time_taken": 20.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, question) = get(
        &app,
        &format!("/api/practice/questions/next?lesson_id={}", room.lesson_id),
        &room.student_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(question["id"], fresh.as_str());
}

#[tokio::test]
async fn test_empty_pool_is_not_found() {
    let app = create_test_app();
    let room = seed_classroom(&app, "empty").await;

    let (status, _) = get(
        &app,
        "/api/practice/questions/next?subject=Biology",
        &room.student_token,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_answer_scoring_and_gamification() {
    let app = create_test_app();
    let room = seed_classroom(&app, "score").await;
    let question_id = create_question(&app, &room, "H2O is?", "Water", "easy").await;
    let uri = format!("/api/practice/questions/{}/answer", question_id);

    let (status, fast) = post(
        &app,
        &uri,
        &room.student_token,
        json!({ "answer": "  water ", "time_taken": 30.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fast["is_correct"], true);
    assert_eq!(fast["points_earned"], 15);
    assert_eq!(fast["current_streak"], 1);

    let (_, slow) = post(
        &app,
        &uri,
        &room.student_token,
        json!({ "answer": "water", "time_taken": 90.0 }),
    )
    .await;
    assert_eq!(slow["points_earned"], 10);
    assert_eq!(slow["total_points"], 25);
    assert_eq!(slow["current_streak"], 2);

    let (_, wrong) = post(&app, &uri, &room.student_token, json!({ "answer": "ice" })).await;
    assert_eq!(wrong["is_correct"], false);
    assert_eq!(wrong["points_earned"], 0);
    assert_eq!(wrong["current_streak"], 0);
    assert_eq!(wrong["correct_answer"], "Water");

    let (status, summary) = get(&app, "/api/practice/gamification", &room.student_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["points"], 25);
    assert_eq!(summary["streak"], 0);

    let (status, mastery) = get(&app, "/api/practice/mastery", &room.student_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mastery[0]["topic"], "Chemistry_easy");
    assert_eq!(mastery[0]["score"], 8.0);
    assert_eq!(mastery[0]["level"], "Beginner");
}

#[tokio::test]
async fn test_first_incorrect_answer_creates_zero_mastery() {
    let app = create_test_app();
    let room = seed_classroom(&app, "zero").await;
    let question_id = create_question(&app, &room, "Noble gas?", "Neon", "easy").await;

    post(
        &app,
        &format!("/api/practice/questions/{}/answer", question_id),
        &room.student_token,
        json!({ "answer": "Oxygen" }),
    )
    .await;

    let (_, mastery) = get(&app, "/api/practice/mastery", &room.student_token).await;
    assert_eq!(mastery[0]["topic"], "Chemistry_easy");
    assert_eq!(mastery[0]["score"], 0.0);
}

#[tokio::test]
async fn test_hint_levels() {
    let app = create_test_app();
    let room = seed_classroom(&app, "hint").await;
    let question_id = create_question(&app, &room, "Lightest element?", "Hydrogen", "easy").await;

    let (status, hint) = get(
        &app,
        &format!("/api/practice/questions/{}/hints?hint_level=3", question_id),
        &room.student_token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hint["hint"], "The answer involves: Hydrogen...");
    assert_eq!(hint["total_hints"], 3);

    let (status, _) = get(
        &app,
        &format!("/api/practice/questions/{}/hints?hint_level=4", question_id),
        &room.student_token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_teacher_cannot_practice() {
    let app = create_test_app();
    let room = seed_classroom(&app, "teach").await;

    let (status, _) = get(&app, "/api/practice/mastery", &room.teacher_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_lifecycle_and_progress() {
    let app = create_test_app();
    let room = seed_classroom(&app, "act").await;

    let (status, session) = post(
        &app,
        "/api/activity/sessions",
        &room.student_token,
        json!({ "session_type": "practice", "lesson_id": room.lesson_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", session);
    let end_uri = format!("/api/activity/sessions/{}/end", session["_id"].as_str().unwrap());

    let (status, _) = post(
        &app,
        &end_uri,
        &room.student_token,
        json!({ "questions_attempted": 2, "correct_answers": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, ended) = post(
        &app,
        &end_uri,
        &room.student_token,
        json!({ "questions_attempted": 4, "correct_answers": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(ended["duration"].is_number());

    let (status, _) = post(&app, &end_uri, &room.student_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, progress) = send(
        &app,
        Method::PUT,
        &format!("/api/activity/progress/{}", room.lesson_id),
        Some(&room.student_token),
        Some(json!({ "completion_percentage": 35.0, "time_spent": 12.5, "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", progress);
    assert_eq!(progress["completion_percentage"], 100.0);
}
