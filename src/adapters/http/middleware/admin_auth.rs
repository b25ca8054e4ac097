//! Bearer-token guard for operator endpoints.
//!
//! ```text
//! Request → admin_auth_middleware → compares token in constant time → Handler
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;

/// The configured operator token.
#[derive(Clone)]
pub struct AdminAuthState {
    token: Arc<Secret<String>>,
}

impl AdminAuthState {
    pub fn new(token: Secret<String>) -> Self {
        Self {
            token: Arc::new(token),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        let expected = self.token.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        expected.len() == presented.len() && bool::from(expected.ct_eq(presented))
    }
}

/// Rejects requests without `Authorization: Bearer <admin token>`.
pub async fn admin_auth_middleware(
    State(auth): State<AdminAuthState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if auth.accepts(token) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Admin request with invalid token");
            unauthorized("Invalid admin token")
        }
        None => unauthorized("Authorization header with Bearer token required"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "code": "AUTHENTICATION_REQUIRED",
            "message": message,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let auth = AdminAuthState::new(Secret::new("s3cret-token".to_string()));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(auth, admin_auth_middleware))
    }

    async fn status_with(header: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn correct_token_passes() {
        assert_eq!(status_with(Some("Bearer s3cret-token")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_or_missing_token_is_unauthorized() {
        assert_eq!(status_with(Some("Bearer s3cret-tokem")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Bearer s3cret")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(Some("Basic abc")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_with(None).await, StatusCode::UNAUTHORIZED);
    }
}
