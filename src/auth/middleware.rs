//! Authentication middleware
//!
//! Every request on a protected route ends in one of two states: rejected
//! with 401, or authenticated with an [`AuthUser`] in its extensions.
//! Pre-flight `OPTIONS` requests never carry credentials and are answered
//! with 204 before any check runs.

use crate::api::handlers::AppState;
use crate::core::error::AppError;
use crate::db::models::Role;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

const BEARER_PREFIX: &str = "Bearer ";

/// Identity resolved from a verified token, stored in request extensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

/// Authentication middleware
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let header_value = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return AppError::AuthenticationError("Unauthorized".to_string()).into_response(),
    };

    let token = match header_value
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
    {
        Some(token) => token,
        None => {
            return AppError::AuthenticationError("Invalid authorization header".to_string())
                .into_response()
        }
    };

    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(reason) => {
            tracing::warn!(%reason, "Bearer token refused");
            return AppError::AuthenticationError("Invalid token".to_string()).into_response();
        }
    };

    request.extensions_mut().insert(AuthUser {
        id: claims.sub,
        role: claims.role,
    });

    next.run(request).await
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AppError::AuthenticationError("Unauthorized".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::test_support::test_state;
    use crate::core::error::ErrorResponse;
    use axum::{body::Body, middleware, routing::get, Json, Router};
    use chrono::{Duration, Utc};
    use tower::util::ServiceExt;

    async fn whoami(user: AuthUser) -> Json<serde_json::Value> {
        Json(serde_json::json!({ "id": user.id, "role": user.role }))
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/protected", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .with_state(state)
    }

    async fn call(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    fn get_with_auth(value: Option<&str>) -> Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/protected");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn message(body: &serde_json::Value) -> String {
        serde_json::from_value::<ErrorResponse>(body.clone()).unwrap().message
    }

    #[tokio::test]
    async fn test_valid_token() {
        let state = test_state();
        let token = state.tokens.issue(5, Role::Professor).unwrap();

        let (status, body) = call(state, get_with_auth(Some(&format!("Bearer {}", token)))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 5);
        assert_eq!(body["role"], "professor");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (status, body) = call(test_state(), get_with_auth(None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message(&body), "Unauthorized");
    }

    #[tokio::test]
    async fn test_wrong_scheme() {
        let (status, body) = call(test_state(), get_with_auth(Some("Basic dGVzdDp0ZXN0"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message(&body), "Invalid authorization header");
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let (status, body) = call(test_state(), get_with_auth(Some("Bearer garbage"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message(&body), "Invalid token");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let state = test_state();
        let token = state
            .tokens
            .issue_at(5, Role::Student, Utc::now() - Duration::hours(48))
            .unwrap();

        let (status, body) = call(state, get_with_auth(Some(&format!("Bearer {}", token)))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message(&body), "Invalid token");
    }

    /// Collects formatted log lines in memory
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_refused_token_reason_logged_at_warn() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let state = test_state();
        let token = state
            .tokens
            .issue_at(5, Role::Student, Utc::now() - Duration::hours(48))
            .unwrap();
        let (status, _) = call(state, get_with_auth(Some(&format!("Bearer {}", token)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Bearer token refused"))
            .expect("refusal should be logged at warn");
        assert!(line.contains("WARN"));
        assert!(line.contains("expired"));
    }

    #[tokio::test]
    async fn test_preflight_bypasses_auth() {
        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/protected")
            .body(Body::empty())
            .unwrap();

        let (status, _) = call(test_state(), request).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
