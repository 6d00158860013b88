//! Per-IP fixed-window limits on the public auth endpoints, counted in Redis.
//! Without Redis the limits are not enforced.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use redis::aio::ConnectionManager;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::services::AppState;

// Returns 1 when the hit is allowed, 0 once the window is full
const RATE_LIMIT_SCRIPT: &str = r#"
    local current = redis.call('GET', KEYS[1])
    if current == false then
        redis.call('SET', KEYS[1], 1, 'EX', tonumber(ARGV[2]))
        return 1
    end
    if tonumber(current) >= tonumber(ARGV[1]) then
        return 0
    end
    redis.call('INCR', KEYS[1])
    return 1
"#;

#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub scope: &'static str,
    /// Environment variable that overrides `max_attempts`
    pub env_override: &'static str,
    pub max_attempts: u32,
    pub window_seconds: u64,
}

/// 10 login attempts per 5 minutes
pub const LOGIN_LIMIT: RateLimit = RateLimit {
    scope: "login",
    env_override: "RATE_LIMIT_LOGIN_ATTEMPTS",
    max_attempts: 10,
    window_seconds: 300,
};

/// 5 registrations per hour
pub const REGISTER_LIMIT: RateLimit = RateLimit {
    scope: "register",
    env_override: "RATE_LIMIT_REGISTER_ATTEMPTS",
    max_attempts: 5,
    window_seconds: 3600,
};

impl RateLimit {
    pub fn effective_max(&self) -> u32 {
        std::env::var(self.env_override)
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(self.max_attempts)
    }

    fn key(&self, client_ip: &str) -> String {
        format!("ratelimit:{}:{}", self.scope, client_ip)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// X-Forwarded-For (first hop), then `Forwarded: for=`, X-Real-IP, and
/// finally the socket address.
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded_for = || {
        header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
    };
    let forwarded = || {
        header_str(headers, "forwarded").and_then(|v| {
            v.split(';')
                .find_map(|part| part.trim().strip_prefix("for="))
                .map(|ip| ip.trim_matches('"'))
        })
    };
    let real_ip = || header_str(headers, "x-real-ip").map(str::trim);

    forwarded_for()
        .or_else(forwarded)
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

async fn hit(redis: &ConnectionManager, key: &str, limit: u32, window: u64) -> anyhow::Result<bool> {
    let mut conn = redis.clone();
    let allowed: u32 = redis::Script::new(RATE_LIMIT_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window)
        .invoke_async(&mut conn)
        .await?;
    Ok(allowed == 1)
}

async fn enforce(state: &AppState, limit: RateLimit, request: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        tracing::debug!("Redis not configured, skipping {} rate limit", limit.scope);
        return next.run(request).await;
    };
    if std::env::var("RATE_LIMIT_DISABLED").is_ok_and(|v| v == "1") {
        return next.run(request).await;
    }

    let ip = client_ip(request.headers(), request.extensions());
    match hit(redis, &limit.key(&ip), limit.effective_max(), limit.window_seconds).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::warn!("{} rate limit exceeded for IP: {}", limit.scope, ip);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "message": "Too many requests, try again later",
                    "status": 429
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("{} rate limit check failed: {}", limit.scope, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state, LOGIN_LIMIT, request, next).await
}

pub async fn register_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state, REGISTER_LIMIT, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn first_forwarded_hop_wins() {
        let h = headers(&[
            ("x-forwarded-for", "1.2.3.4, 10.0.0.1"),
            ("x-real-ip", "9.9.9.9"),
        ]);
        assert_eq!(client_ip(&h, &Extensions::new()), "1.2.3.4");
    }

    #[test]
    fn forwarded_header_and_real_ip() {
        let h = headers(&[("forwarded", "for=\"5.6.7.8\";proto=http")]);
        assert_eq!(client_ip(&h, &Extensions::new()), "5.6.7.8");

        let h = headers(&[("x-real-ip", " 9.9.9.9 ")]);
        assert_eq!(client_ip(&h, &Extensions::new()), "9.9.9.9");
    }

    #[test]
    fn falls_back_to_socket_then_unknown() {
        let mut exts = Extensions::new();
        exts.insert(ConnectInfo::<SocketAddr>("7.7.7.7:1234".parse().unwrap()));
        assert_eq!(client_ip(&HeaderMap::new(), &exts), "7.7.7.7");
        assert_eq!(client_ip(&HeaderMap::new(), &Extensions::new()), "unknown");
    }

    #[test]
    #[serial]
    fn env_overrides_attempts() {
        std::env::remove_var(LOGIN_LIMIT.env_override);
        assert_eq!(LOGIN_LIMIT.effective_max(), 10);

        std::env::set_var(LOGIN_LIMIT.env_override, "3");
        assert_eq!(LOGIN_LIMIT.effective_max(), 3);

        std::env::set_var(LOGIN_LIMIT.env_override, "lots");
        assert_eq!(LOGIN_LIMIT.effective_max(), 10);
        std::env::remove_var(LOGIN_LIMIT.env_override);
    }

    #[test]
    fn keys_are_scoped() {
        assert_eq!(REGISTER_LIMIT.key("1.2.3.4"), "ratelimit:register:1.2.3.4");
    }
}
