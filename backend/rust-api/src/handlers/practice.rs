use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        content::QuestionView,
        practice::{
            AnswerResponse, GamificationSummary, HintQuery, HintResponse, MasteryView,
            NextQuestionQuery, SubmitAnswerRequest,
        },
    },
    services::{
        answer_service::AnswerService,
        capability::{Actor, Operation},
        hint_service::HintService,
        question_selector::QuestionSelector,
        AppState,
    },
};

/// GET /api/practice/questions/next
pub async fn next_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<NextQuestionQuery>,
) -> AppResult<Json<QuestionView>> {
    let actor = Actor::authorize(&claims, Operation::SelectQuestion)?;
    let selector = QuestionSelector::new(state.store.clone(), state.selection_rng.clone());
    Ok(Json(
        selector
            .select_next_question(&actor.user_id, &query)
            .await?,
    ))
}

/// POST /api/practice/questions/{id}/answer
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> AppResult<Json<AnswerResponse>> {
    let actor = Actor::authorize(&claims, Operation::SubmitAnswer)?;
    Ok(Json(
        AnswerService::new(state.store.clone())
            .evaluate_answer(&actor.user_id, &question_id, &req)
            .await?,
    ))
}

/// GET /api/practice/questions/{id}/hints?hint_level=1
pub async fn request_hint(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
    Query(query): Query<HintQuery>,
) -> AppResult<Json<HintResponse>> {
    Actor::authorize(&claims, Operation::RequestHint)?;
    let level = query.hint_level.unwrap_or(1);
    Ok(Json(
        HintService::new(state.store.clone())
            .request_hint(&question_id, level)
            .await?,
    ))
}

/// GET /api/practice/mastery
pub async fn list_mastery(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<Vec<MasteryView>>> {
    let actor = Actor::authorize(&claims, Operation::ViewOwnMastery)?;
    Ok(Json(
        AnswerService::new(state.store.clone())
            .list_mastery(&actor.user_id)
            .await?,
    ))
}

/// GET /api/practice/gamification
pub async fn gamification(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<Json<GamificationSummary>> {
    let actor = Actor::authorize(&claims, Operation::ViewOwnGamification)?;
    Ok(Json(
        AnswerService::new(state.store.clone())
            .gamification_summary(&actor.user_id)
            .await?,
    ))
}
