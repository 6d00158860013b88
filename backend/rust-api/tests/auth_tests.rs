use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{create_test_app, register, send, signup, PASSWORD};

#[tokio::test]
async fn test_register_returns_profile_without_password() {
    let app = create_test_app();

    let (status, body) = register(&app, "alice", "student").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "student");
    assert_eq!(body["language"], "en");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let app = create_test_app();
    register(&app, "bob", "student").await;

    let (status, body) = register(&app, "bob", "teacher").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": "short",
            "full_name": "Carol",
            "role": "student",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/token",
        None,
        Some(json!({ "username": "missing-password" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = create_test_app();
    register(&app, "dave", "student").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/token",
        None,
        Some(json!({ "username": "dave", "password": "not-the-password" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect username or password");
}

#[tokio::test]
async fn test_me_requires_bearer_token() {
    let app = create_test_app();

    let (status, _) = send(&app, Method::GET, "/auth/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/auth/users/me",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let app = create_test_app();
    let (user_id, token) = signup(&app, "erin", "teacher").await;

    let (status, me) = send(&app, Method::GET, "/auth/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id.as_str());

    let (status, updated) = send(
        &app,
        Method::PUT,
        "/auth/users/me",
        Some(&token),
        Some(json!({
            "username": "erin2",
            "email": "erin2@example.com",
            "full_name": "Erin Two",
            "language": "he",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["username"], "erin2");
    assert_eq!(updated["language"], "he");
}

#[tokio::test]
async fn test_profile_update_rejects_taken_email() {
    let app = create_test_app();
    signup(&app, "frank", "student").await;
    let (_, token) = signup(&app, "grace", "student").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/auth/users/me",
        Some(&token),
        Some(json!({
            "username": "grace",
            "email": "frank@example.com",
            "full_name": "Grace",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_change_password_flow() {
    let app = create_test_app();
    let (_, token) = signup(&app, "heidi", "student").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/auth/users/me/password",
        Some(&token),
        Some(json!({ "old_password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/auth/users/me/password",
        Some(&token),
        Some(json!({ "old_password": "wrong-password", "new_password": "new-password-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/auth/users/me/password",
        Some(&token),
        Some(json!({ "old_password": PASSWORD, "new_password": "new-password-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/token",
        None,
        Some(json!({ "username": "heidi", "password": "new-password-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_metrics_auth() {
    let app = create_test_app();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["memory"]["status"], "healthy");

    let (status, _) = send(&app, Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
