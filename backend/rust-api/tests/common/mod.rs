#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use edufix_api::{
    config::Config,
    create_router,
    services::{store::MemoryStore, AppState},
};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "password123";

pub fn create_test_app() -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let mut config = Config::in_memory(TEST_SECRET);
    config.selection_seed = Some(7);

    let app_state = Arc::new(AppState::with_store(config, Arc::new(MemoryStore::new())));
    create_router(app_state)
}

/// Sends a JSON request and returns the status with the parsed body
/// (`Value::Null` when the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn register(app: &Router, username: &str, role: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
            "full_name": format!("{} Test", username),
            "role": role,
        })),
    )
    .await
}

/// Registers a user and logs in, returning (user id, bearer token).
pub async fn signup(app: &Router, username: &str, role: &str) -> (String, String) {
    let (status, profile) = register(app, username, role).await;
    assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, profile);

    let (status, token) = send(
        app,
        Method::POST,
        "/auth/token",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login {}: {}", username, token);

    (
        profile["id"].as_str().unwrap().to_string(),
        token["access_token"].as_str().unwrap().to_string(),
    )
}

/// Stored entities are serialized with their document key.
pub fn id_of(value: &Value) -> String {
    value["_id"].as_str().unwrap().to_string()
}

pub struct Classroom {
    pub teacher_id: String,
    pub teacher_token: String,
    pub student_id: String,
    pub student_token: String,
    pub class_id: String,
    pub course_id: String,
    pub unit_id: String,
    pub lesson_id: String,
}

/// A teacher with one class holding an enrolled student and a
/// course → unit → lesson chain.
pub async fn seed_classroom(app: &Router, prefix: &str) -> Classroom {
    let (teacher_id, teacher_token) = signup(app, &format!("{}_teacher", prefix), "teacher").await;
    let (student_id, student_token) = signup(app, &format!("{}_student", prefix), "student").await;

    let (status, class) = post(
        app,
        "/api/classes",
        &teacher_token,
        json!({ "name": "Grade 7", "subject": "Chemistry" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", class);
    let class_id = id_of(&class);

    let (status, _) = post(
        app,
        &format!("/api/classes/{}/students", class_id),
        &teacher_token,
        json!({ "student_id": student_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, course) = post(
        app,
        "/api/courses",
        &teacher_token,
        json!({ "name": "Basics", "subject": "Chemistry", "class_id": class_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", course);
    let course_id = id_of(&course);

    let (status, unit) = post(
        app,
        "/api/units",
        &teacher_token,
        json!({ "name": "Matter", "course_id": course_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", unit);
    let unit_id = id_of(&unit);

    let (status, lesson) = post(
        app,
        "/api/lessons",
        &teacher_token,
        json!({ "title": "Atoms", "unit_id": unit_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", lesson);
    let lesson_id = id_of(&lesson);

    Classroom {
        teacher_id,
        teacher_token,
        student_id,
        student_token,
        class_id,
        course_id,
        unit_id,
        lesson_id,
    }
}

pub async fn create_question(
    app: &Router,
    classroom: &Classroom,
    text: &str,
    answer: &str,
    difficulty: &str,
) -> String {
    let (status, question) = post(
        app,
        "/api/questions",
        &classroom.teacher_token,
        json!({
            "lesson_id": classroom.lesson_id,
            "question_text": text,
            "question_type": "short_answer",
            "correct_answer": answer,
            "difficulty": difficulty,
            "subject": "Chemistry",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", question);
    id_of(&question)
}
