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
    models::{
        classroom::{Class, CreateClassRequest, EnrollStudentRequest},
        user::UserProfile,
    },
    services::{
        capability::{Actor, Operation},
        classroom_service::ClassroomService,
        AppState,
    },
};

/// POST /api/classes
pub async fn create_class(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateClassRequest>,
) -> AppResult<(StatusCode, Json<Class>)> {
    let actor = Actor::authorize(&claims, Operation::CreateClass)?;
    let class = ClassroomService::new(state.store.clone())
        .create_class(&actor, req)
        .await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// GET /api/classes
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<Vec<Class>>> {
    let actor = Actor::authorize(&claims, Operation::ListClasses)?;
    Ok(Json(
        ClassroomService::new(state.store.clone())
            .list_classes(&actor)
            .await?,
    ))
}

/// POST /api/classes/{id}/students
pub async fn enroll_student(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    AppJson(req): AppJson<EnrollStudentRequest>,
) -> AppResult<Json<UserProfile>> {
    let actor = Actor::authorize(&claims, Operation::EnrollStudent)?;
    Ok(Json(
        ClassroomService::new(state.store.clone())
            .enroll_student(&actor, &class_id, &req.student_id)
            .await?,
    ))
}
