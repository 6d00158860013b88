use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::{
        ChangePasswordRequest, LoginRequest, RegisterRequest, TokenResponse, UpdateProfileRequest,
        UserProfile,
    },
    services::{
        auth_service::AuthService,
        capability::{Actor, Operation},
        AppState,
    },
};

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.store.clone(), &state.config)
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    tracing::info!("Registering new user: {}", req.username);
    let profile = service(&state).register(req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /auth/token
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    Ok(Json(service(&state).login(req).await?))
}

/// GET /auth/users/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<UserProfile>> {
    let actor = Actor::authorize(&claims, Operation::ReadProfile)?;
    Ok(Json(service(&state).current_user(&actor.user_id).await?))
}

/// PUT /auth/users/me
pub async fn update_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<UserProfile>> {
    let actor = Actor::authorize(&claims, Operation::UpdateProfile)?;
    Ok(Json(
        service(&state).update_profile(&actor.user_id, req).await?,
    ))
}

/// PUT /auth/users/me/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let actor = Actor::authorize(&claims, Operation::UpdateProfile)?;
    service(&state)
        .change_password(&actor.user_id, req)
        .await?;
    Ok(Json(json!({ "message": "Password updated successfully" })))
}
