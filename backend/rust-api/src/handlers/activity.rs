use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::activity::{
        EndSessionRequest, Progress, Session, StartSessionRequest, UpdateProgressRequest,
    },
    services::{
        activity_service::ActivityService,
        capability::{Actor, Operation},
        AppState,
    },
};

/// POST /api/activity/sessions
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<StartSessionRequest>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let actor = Actor::authorize(&claims, Operation::TrackActivity)?;
    let session = ActivityService::new(state.store.clone())
        .start_session(&actor.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/activity/sessions/{id}/end
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<EndSessionRequest>,
) -> AppResult<Json<Session>> {
    let actor = Actor::authorize(&claims, Operation::TrackActivity)?;
    Ok(Json(
        ActivityService::new(state.store.clone())
            .end_session(&actor.user_id, &session_id, req)
            .await?,
    ))
}

/// PUT /api/activity/progress/{lesson_id}
pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
    AppJson(req): AppJson<UpdateProgressRequest>,
) -> AppResult<Json<Progress>> {
    let actor = Actor::authorize(&claims, Operation::TrackActivity)?;
    Ok(Json(
        ActivityService::new(state.store.clone())
            .update_progress(&actor.user_id, &lesson_id, req)
            .await?,
    ))
}
