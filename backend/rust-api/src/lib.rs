use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match config
        .cors_origin
        .as_deref()
        .and_then(|o| HeaderValue::from_str(o).ok())
    {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(origin)
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/auth", auth_routes(app_state.clone()))
        .nest(
            "/api",
            api_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::register_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/token", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(handlers::auth::get_current_user).put(handlers::auth::update_current_user),
        )
        .route("/users/me/password", put(handlers::auth::change_password))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    register_route.merge(login_route).merge(protected_routes)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Classes
        .route(
            "/classes",
            get(handlers::classes::list_classes).post(handlers::classes::create_class),
        )
        .route(
            "/classes/{id}/students",
            post(handlers::classes::enroll_student),
        )
        // Content
        .route(
            "/courses",
            get(handlers::content::list_courses).post(handlers::content::create_course),
        )
        .route("/courses/{id}", get(handlers::content::get_course))
        .route(
            "/units",
            get(handlers::content::list_units).post(handlers::content::create_unit),
        )
        .route(
            "/lessons",
            get(handlers::content::list_lessons).post(handlers::content::create_lesson),
        )
        .route(
            "/materials",
            get(handlers::content::list_materials).post(handlers::content::create_material),
        )
        .route(
            "/questions",
            get(handlers::content::list_questions).post(handlers::content::create_question),
        )
        // Practice
        .route(
            "/practice/questions/next",
            get(handlers::practice::next_question),
        )
        .route(
            "/practice/questions/{id}/answer",
            post(handlers::practice::submit_answer),
        )
        .route(
            "/practice/questions/{id}/hints",
            get(handlers::practice::request_hint),
        )
        .route("/practice/mastery", get(handlers::practice::list_mastery))
        .route(
            "/practice/gamification",
            get(handlers::practice::gamification),
        )
        // Activity
        .route(
            "/activity/sessions",
            post(handlers::activity::start_session),
        )
        .route(
            "/activity/sessions/{id}/end",
            post(handlers::activity::end_session),
        )
        .route(
            "/activity/progress/{lesson_id}",
            put(handlers::activity::update_progress),
        )
        // Analytics
        .route("/analytics/dashboard", get(handlers::analytics::dashboard))
        .route(
            "/analytics/students/{id}/insights",
            get(handlers::analytics::student_insight),
        )
        .route(
            "/analytics/classes/{id}/progress",
            get(handlers::analytics::class_progress),
        )
        .route(
            "/analytics/interventions",
            get(handlers::analytics::list_interventions)
                .post(handlers::analytics::create_intervention),
        )
        .route(
            "/analytics/interventions/{id}",
            patch(handlers::analytics::update_intervention),
        )
        // Management
        .route("/management/overview", get(handlers::management::overview))
        .route("/management/teachers", get(handlers::management::teachers))
        .route("/management/students", get(handlers::management::students))
        .route("/management/classes", get(handlers::management::classes))
        .route("/management/lessons", get(handlers::management::lessons))
}
