use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        analytics::{DashboardMetrics, LessonProgress, StudentInsight},
        intervention::{
            CreateInterventionRequest, Intervention, InterventionFilter, InterventionSummary,
            UpdateInterventionRequest,
        },
    },
    services::{
        analytics_service::AnalyticsService,
        capability::{Actor, Operation},
        intervention_service::InterventionService,
        AppState,
    },
};

/// GET /api/analytics/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<DashboardMetrics>> {
    let actor = Actor::authorize(&claims, Operation::ViewDashboard)?;
    Ok(Json(
        AnalyticsService::new(state.store.clone())
            .get_dashboard(&actor.user_id)
            .await?,
    ))
}

/// GET /api/analytics/students/{id}/insights
pub async fn student_insight(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(student_id): Path<String>,
) -> AppResult<Json<StudentInsight>> {
    let actor = Actor::authorize(&claims, Operation::ViewStudentInsight)?;
    Ok(Json(
        AnalyticsService::new(state.store.clone())
            .get_student_insight(&actor.user_id, &student_id)
            .await?,
    ))
}

/// GET /api/analytics/classes/{id}/progress
pub async fn class_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
) -> AppResult<Json<Vec<LessonProgress>>> {
    let actor = Actor::authorize(&claims, Operation::ViewClassProgress)?;
    Ok(Json(
        AnalyticsService::new(state.store.clone())
            .get_class_progress(&actor.user_id, &class_id)
            .await?,
    ))
}

/// GET /api/analytics/interventions?status=pending&priority=high
pub async fn list_interventions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(filter): Query<InterventionFilter>,
) -> AppResult<Json<Vec<InterventionSummary>>> {
    let actor = Actor::authorize(&claims, Operation::ManageInterventions)?;
    Ok(Json(
        InterventionService::new(state.store.clone())
            .list_interventions(&actor.user_id, &filter)
            .await?,
    ))
}

/// POST /api/analytics/interventions
pub async fn create_intervention(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateInterventionRequest>,
) -> AppResult<(StatusCode, Json<Intervention>)> {
    let actor = Actor::authorize(&claims, Operation::ManageInterventions)?;
    let intervention = InterventionService::new(state.store.clone())
        .create_intervention(&actor.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(intervention)))
}

/// PATCH /api/analytics/interventions/{id}
pub async fn update_intervention(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intervention_id): Path<String>,
    AppJson(req): AppJson<UpdateInterventionRequest>,
) -> AppResult<Json<Intervention>> {
    let actor = Actor::authorize(&claims, Operation::ManageInterventions)?;
    Ok(Json(
        InterventionService::new(state.store.clone())
            .update_status(&actor.user_id, &intervention_id, req.status)
            .await?,
    ))
}
