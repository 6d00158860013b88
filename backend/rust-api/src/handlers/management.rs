use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middlewares::auth::JwtClaims,
    models::{
        analytics::PlatformOverview,
        management::{ClassSummary, LessonSummary, StudentSummary, TeacherSummary},
    },
    services::{
        analytics_service::AnalyticsService,
        capability::{Actor, Operation},
        management_service::ManagementService,
        AppState,
    },
};

/// GET /api/management/overview
pub async fn overview(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<PlatformOverview>> {
    Actor::authorize(&claims, Operation::ViewPlatformOverview)?;
    Ok(Json(
        AnalyticsService::new(state.store.clone())
            .get_platform_overview()
            .await?,
    ))
}

pub async fn teachers(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<Vec<TeacherSummary>>> {
    Actor::authorize(&claims, Operation::ListPlatformEntities)?;
    Ok(Json(
        ManagementService::new(state.store.clone())
            .list_teachers()
            .await?,
    ))
}

pub async fn students(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<Vec<StudentSummary>>> {
    Actor::authorize(&claims, Operation::ListPlatformEntities)?;
    Ok(Json(
        ManagementService::new(state.store.clone())
            .list_students()
            .await?,
    ))
}

pub async fn classes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<Vec<ClassSummary>>> {
    Actor::authorize(&claims, Operation::ListPlatformEntities)?;
    Ok(Json(
        ManagementService::new(state.store.clone())
            .list_classes()
            .await?,
    ))
}

pub async fn lessons(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<Vec<LessonSummary>>> {
    Actor::authorize(&claims, Operation::ListPlatformEntities)?;
    Ok(Json(
        ManagementService::new(state.store.clone())
            .list_lessons()
            .await?,
    ))
}
