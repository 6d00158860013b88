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
    models::content::{
        Course, CourseListQuery, CreateCourseRequest, CreateLessonRequest,
        CreateMaterialRequest, CreateQuestionRequest, CreateUnitRequest, Lesson, LessonListQuery,
        Material, MaterialListQuery, Question, QuestionListQuery, Unit, UnitListQuery,
    },
    services::{
        capability::{Actor, Operation},
        content_service::ContentService,
        AppState,
    },
};

fn service(state: &AppState) -> ContentService {
    ContentService::new(state.store.clone())
}

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> AppResult<(StatusCode, Json<Course>)> {
    let actor = Actor::authorize(&claims, Operation::AuthorContent)?;
    let course = service(&state).create_course(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<CourseListQuery>,
) -> AppResult<Json<Vec<Course>>> {
    let actor = Actor::authorize(&claims, Operation::ReadContent)?;
    Ok(Json(service(&state).list_courses(&actor, &query).await?))
}

pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> AppResult<Json<Course>> {
    let actor = Actor::authorize(&claims, Operation::ReadContent)?;
    Ok(Json(service(&state).get_course(&actor, &course_id).await?))
}

pub async fn create_unit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateUnitRequest>,
) -> AppResult<(StatusCode, Json<Unit>)> {
    let actor = Actor::authorize(&claims, Operation::AuthorContent)?;
    let unit = service(&state).create_unit(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn list_units(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<UnitListQuery>,
) -> AppResult<Json<Vec<Unit>>> {
    let actor = Actor::authorize(&claims, Operation::ReadContent)?;
    Ok(Json(service(&state).list_units(&actor, &query).await?))
}

pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateLessonRequest>,
) -> AppResult<(StatusCode, Json<Lesson>)> {
    let actor = Actor::authorize(&claims, Operation::AuthorContent)?;
    let lesson = service(&state).create_lesson(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<LessonListQuery>,
) -> AppResult<Json<Vec<Lesson>>> {
    let actor = Actor::authorize(&claims, Operation::ReadContent)?;
    Ok(Json(service(&state).list_lessons(&actor, &query).await?))
}

pub async fn create_material(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateMaterialRequest>,
) -> AppResult<(StatusCode, Json<Material>)> {
    let actor = Actor::authorize(&claims, Operation::AuthorContent)?;
    let material = service(&state).create_material(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn list_materials(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<MaterialListQuery>,
) -> AppResult<Json<Vec<Material>>> {
    let actor = Actor::authorize(&claims, Operation::ReadContent)?;
    Ok(Json(service(&state).list_materials(&actor, &query).await?))
}

/// Authoring view; includes the answer key.
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateQuestionRequest>,
) -> AppResult<(StatusCode, Json<Question>)> {
    let actor = Actor::authorize(&claims, Operation::AuthorContent)?;
    let question = service(&state).create_question(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<QuestionListQuery>,
) -> AppResult<Json<Vec<Question>>> {
    let actor = Actor::authorize(&claims, Operation::ListQuestions)?;
    Ok(Json(service(&state).list_questions(&actor, &query).await?))
}
