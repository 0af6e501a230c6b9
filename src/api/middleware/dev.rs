use crate::api::handlers::AppState;
use crate::core::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Gate for development-only routes. Outside `app.environment = "dev"` every
/// request is refused with 403.
pub async fn dev_only(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.app.is_dev() {
        return AppError::PermissionDenied("Forbidden".to_string()).into_response();
    }

    next.run(request).await
}
