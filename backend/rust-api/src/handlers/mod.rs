use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::services::AppState;

pub mod activity;
pub mod analytics;
pub mod auth;
pub mod classes;
pub mod content;
pub mod management;
pub mod practice;

#[derive(Debug, Serialize)]
struct DependencyHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DependencyHealth {
    fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs a dependency ping under a deadline.
async fn probe<F, E>(label: &str, deadline: Duration, ping: F) -> DependencyHealth
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let error = match tokio::time::timeout(deadline, ping).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{} error: {}", label, e)),
        Err(_) => Some(format!("{} timeout after {}ms", label, deadline.as_millis())),
    };
    if let Some(error) = &error {
        tracing::warn!("Health probe failed: {}", error);
    }
    DependencyHealth {
        status: if error.is_none() { "healthy" } else { "unhealthy" },
        error,
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = BTreeMap::new();

    dependencies.insert(
        state.store.backend_name(),
        probe("Store", Duration::from_secs(1), state.store.ping()).await,
    );

    // Redis is optional; only reported when configured
    if let Some(mut conn) = state.redis.clone() {
        let ping = async move {
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map(drop)
        };
        dependencies.insert("redis", probe("Redis", Duration::from_millis(500), ping).await);
    }

    let (status_code, status) = if dependencies.values().all(DependencyHealth::is_healthy) {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "edufix-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Guards /metrics with HTTP Basic auth against `METRICS_AUTH` (user:password).
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
