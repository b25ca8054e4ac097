//! Rate limiting middleware for axum.
//!
//! Enforces limits using the `RateLimiter` port. Scopes are checked in order:
//! 1. Per-IP rate limit
//! 2. Global rate limit (infrastructure protection)
//!
//! A request denied by its IP window is not counted against the global one.
//!
//! Rate limit status is returned in standard HTTP headers:
//! - `X-RateLimit-Limit`: Maximum requests allowed in the window
//! - `X-RateLimit-Remaining`: Requests remaining in the current window
//! - `X-RateLimit-Reset`: Unix timestamp when the window resets
//! - `Retry-After`: Seconds to wait (only on 429 response)
//!
//! # Example
//!
//! ```ignore
//! let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::with_defaults());
//!
//! let app = Router::new()
//!     .route("/webhooks/payment", post(handler))
//!     .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::ports::{RateLimitKey, RateLimitResult, RateLimiter};

/// Rate limiter middleware state.
pub type RateLimiterState = Arc<dyn RateLimiter>;

/// Standard rate limit header names.
pub mod headers {
    use super::HeaderName;

    /// Maximum requests allowed in the window.
    pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
    /// Requests remaining in the current window.
    pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
    /// Unix timestamp when the window resets.
    pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
}

/// Checks the per-IP then the global limit before the handler runs.
///
/// Limiter failures are logged and the request proceeds.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = extract_client_ip(request.headers(), connect_info.as_ref());

    let ip_status = match &client_ip {
        Some(ip) => match limiter.check(RateLimitKey::ip(ip)).await {
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::warn!(client_ip = %ip, retry_after = denied.retry_after_secs, "Rate limit exceeded");
                return rate_limit_response(denied.limit, denied.retry_after_secs, &denied.message);
            }
            Ok(RateLimitResult::Allowed(status)) => Some(status),
            Err(e) => {
                tracing::warn!(error = %e, "Rate limiter unavailable for IP check");
                None
            }
        },
        None => None,
    };

    match limiter.check(RateLimitKey::global()).await {
        Ok(RateLimitResult::Denied(denied)) => {
            return rate_limit_response(denied.limit, denied.retry_after_secs, &denied.message);
        }
        Err(e) => tracing::warn!(error = %e, "Rate limiter unavailable"),
        Ok(RateLimitResult::Allowed(_)) => {}
    }

    let mut response = next.run(request).await;

    if let Some(status) = ip_status {
        add_rate_limit_headers(
            response.headers_mut(),
            status.limit,
            status.remaining,
            status.reset_at.as_unix_secs(),
        );
    }

    response
}

/// Extract client IP, checking forwarded headers first.
///
/// Order of precedence:
/// 1. X-Forwarded-For header (first IP in list)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    connect_info.map(|ci| ci.0.ip().to_string())
}

/// Create a 429 Too Many Requests response.
fn rate_limit_response(limit: u32, retry_after_secs: u32, message: &str) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "success": false,
            "message": message,
            "retry_after_secs": retry_after_secs
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(headers::X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(headers::X_RATELIMIT_REMAINING.clone(), HeaderValue::from(0u32));
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));

    response
}

fn add_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_at: u64) {
    headers.insert(headers::X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(headers::X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
    headers.insert(headers::X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitRules, WindowRule};
    use axum::{body::Body, middleware, routing::post, Router};
    use tower::ServiceExt;

    fn app(limit: u32) -> Router {
        app_with(RateLimitRules::per_ip(limit, 60))
    }

    fn app_with(rules: RateLimitRules) -> Router {
        let limiter: RateLimiterState = Arc::new(InMemoryRateLimiter::new(rules));
        Router::new()
            .route("/", post(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    }

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Client IP
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn forwarded_for_takes_first_entry() {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        h.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&h, None).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn real_ip_then_socket_address() {
        let mut h = HeaderMap::new();
        h.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&h, None).as_deref(), Some("10.0.0.2"));

        let socket = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(
            extract_client_ip(&HeaderMap::new(), Some(&socket)).as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Middleware
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn allowed_requests_carry_headers() {
        let response = app(10).oneshot(request_from("198.51.100.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "9");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    #[tokio::test]
    async fn request_over_limit_gets_429_with_retry_after() {
        let app = app(2);
        for _ in 0..2 {
            let ok = app.clone().oneshot(request_from("198.51.100.2")).await.unwrap();
            assert_eq!(ok.status(), StatusCode::OK);
        }

        let denied = app.clone().oneshot(request_from("198.51.100.2")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(denied.headers().contains_key("retry-after"));
        assert_eq!(denied.headers()["x-ratelimit-remaining"], "0");

        let other = app.oneshot(request_from("198.51.100.3")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn throttled_ip_does_not_spend_global_budget() {
        let app = app_with(RateLimitRules {
            global: WindowRule::new(5, 60),
            per_ip: WindowRule::new(2, 60),
        });
        for _ in 0..20 {
            app.clone().oneshot(request_from("203.0.113.66")).await.unwrap();
        }

        let other = app.oneshot(request_from("198.51.100.9")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(other.headers()["x-ratelimit-remaining"], "1");
    }

    #[tokio::test]
    async fn global_limit_still_caps_distinct_ips() {
        let app = app_with(RateLimitRules {
            global: WindowRule::new(3, 60),
            per_ip: WindowRule::new(10, 60),
        });
        for i in 0..3 {
            let ok = app
                .clone()
                .oneshot(request_from(&format!("198.51.100.{}", 20 + i)))
                .await
                .unwrap();
            assert_eq!(ok.status(), StatusCode::OK);
        }

        let denied = app.oneshot(request_from("198.51.100.40")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
