//! Role gates
//!
//! Mounted behind [`authenticate`](super::middleware::authenticate); the
//! `AuthUser` it inserted is the only source of the caller's role. Roles are
//! not hierarchical: a professor is not a student.

use crate::auth::middleware::AuthUser;
use crate::core::error::AppError;
use crate::db::models::Role;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

async fn enforce(required: Role, request: Request, next: Next) -> Response {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => *user,
        None => return AppError::AuthenticationError("Unauthorized".to_string()).into_response(),
    };

    if user.role != required {
        tracing::debug!(user_id = user.id, role = %user.role, required = %required, "Role gate refused");
        return AppError::PermissionDenied("Forbidden".to_string()).into_response();
    }

    next.run(request).await
}

/// Only students pass
pub async fn require_student(request: Request, next: Next) -> Response {
    enforce(Role::Student, request, next).await
}

/// Only professors pass
pub async fn require_professor(request: Request, next: Next) -> Response {
    enforce(Role::Professor, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::util::ServiceExt;

    async fn ok() -> &'static str {
        "ok"
    }

    async fn status_for(caller: Option<Role>, gate_professor: bool) -> StatusCode {
        let gated = if gate_professor {
            Router::new()
                .route("/gated", get(ok))
                .layer(middleware::from_fn(require_professor))
        } else {
            Router::new()
                .route("/gated", get(ok))
                .layer(middleware::from_fn(require_student))
        };

        let mut request = axum::http::Request::builder()
            .uri("/gated")
            .body(Body::empty())
            .unwrap();
        if let Some(role) = caller {
            request.extensions_mut().insert(AuthUser { id: 1, role });
        }

        gated.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_professor_gate() {
        assert_eq!(status_for(Some(Role::Professor), true).await, StatusCode::OK);
        assert_eq!(status_for(Some(Role::Student), true).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_student_gate() {
        assert_eq!(status_for(Some(Role::Student), false).await, StatusCode::OK);
        assert_eq!(status_for(Some(Role::Professor), false).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_gate_without_identity() {
        assert_eq!(status_for(None, true).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(None, false).await, StatusCode::UNAUTHORIZED);
    }
}
