//! Authentication API handlers

use crate::api::handlers::AppState;
use crate::auth::middleware::AuthUser;
use crate::auth::models::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, SetNameRequest, UserInfo,
};
use crate::cache::profile_key;
use crate::core::error::{AppError, Result};
use crate::db::models::NewUser;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Unwrap a JSON body, mapping any extractor rejection to a 400
pub(crate) fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "Request body rejected");
        AppError::InvalidRequest("Invalid request".to_string())
    })
}

/// Handler for POST /users/register - Account creation
pub async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(body)?;
    let email = req.email.trim().to_string();
    let name = req.name.trim().to_string();

    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::ValidationError("Email and password are required".to_string()));
    }
    if name.is_empty() {
        return Err(AppError::ValidationError("Name is required".to_string()));
    }

    let role = req.role.unwrap_or_default();
    tracing::info!(email = %email, role = %role, "Registration attempt");

    let password_hash = state.hasher.hash_async(&req.password).await?;
    let user = state
        .users
        .create(&NewUser {
            email,
            name,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = user.id, email = %user.email, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

/// Handler for POST /users/login - Exchange credentials for a token
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let req = json_body(body)?;
    let email = req.email.trim();

    if email.is_empty() {
        return Err(AppError::ValidationError("Email is required".to_string()));
    }
    if req.password.is_empty() {
        return Err(AppError::ValidationError("Password is required".to_string()));
    }

    let user = state.users.find_by_email(email).await?;

    // Unknown emails still pay for one comparison
    let digest = match &user {
        Some(user) => user.password_hash.as_str(),
        None => state.dummy_digest.as_str(),
    };
    let password_ok = state.hasher.verify_async(&req.password, digest).await?;

    let user = match user {
        Some(user) if password_ok => user,
        _ => {
            tracing::warn!(email = %email, "Login refused");
            return Err(AppError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
        }
    };

    let token = state.tokens.issue(user.id, user.role)?;
    tracing::info!(user_id = user.id, role = %user.role, "Login successful");

    Ok(Json(LoginResponse {
        token,
        user: UserInfo::from(user),
    }))
}

/// Handler for GET /me - Public profile of the caller, served cache-aside
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> Result<Json<UserInfo>> {
    let key = profile_key(user.id);

    match state.profile_cache.get(&key).await {
        Ok(Some(bytes)) => match serde_json::from_slice::<UserInfo>(&bytes) {
            Ok(info) => return Ok(Json(info)),
            Err(e) => tracing::warn!(key = %key, error = %e, "Discarding unreadable cached profile"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(key = %key, error = %e, "Profile cache read failed"),
    }

    let info = state
        .users
        .find_by_id(user.id)
        .await?
        .map(UserInfo::from)
        .ok_or_else(|| AppError::AuthenticationError("User not found".to_string()))?;

    match serde_json::to_vec(&info) {
        Ok(bytes) => {
            if let Err(e) = state.profile_cache.set(&key, bytes, state.profile_ttl).await {
                tracing::warn!(key = %key, error = %e, "Profile cache write failed");
            }
        }
        Err(e) => tracing::warn!(key = %key, error = %e, "Profile could not be serialized"),
    }

    Ok(Json(info))
}

/// Handler for POST /users/name - Change the caller's display name
pub async fn set_name(
    State(state): State<AppState>,
    user: AuthUser,
    body: std::result::Result<Json<SetNameRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = json_body(body)?;
    let name = req.name.trim();

    if name.is_empty() {
        return Err(AppError::ValidationError("Name is required".to_string()));
    }

    let updated = state.users.update_name(user.id, name).await?;
    if updated == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let key = profile_key(user.id);
    if let Err(e) = state.profile_cache.invalidate(&key).await {
        tracing::warn!(key = %key, error = %e, "Profile cache invalidation failed");
    }

    tracing::info!(user_id = user.id, "Display name updated");

    Ok(Json(MessageResponse::new("User name set successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::test_support::test_state;
    use crate::db::models::Role;

    fn register_body(email: &str, name: &str, password: &str) -> Json<RegisterRequest> {
        Json(RegisterRequest {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
            role: None,
        })
    }

    async fn register_user(state: &AppState, email: &str) -> UserInfo {
        register(State(state.clone()), Ok(register_body(email, "Ada", "pw123456")))
            .await
            .unwrap();
        let user = state.users.find_by_email(email).await.unwrap().unwrap();
        UserInfo::from(user)
    }

    fn login_body(email: &str, password: &str) -> Json<LoginRequest> {
        Json(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn test_register_defaults_to_student() {
        let state = test_state();

        let info = register_user(&state, "a@x.io").await;

        assert_eq!(info.role, Role::Student);
        assert_eq!(info.name, "Ada");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let state = test_state();

        let err = register(State(state.clone()), Ok(register_body("", "Ada", "pw")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.public_message(), "Email and password are required");

        let err = register(State(state.clone()), Ok(register_body("a@x.io", "  ", "pw")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.public_message(), "Name is required");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let state = test_state();
        let first = register_user(&state, "a@x.io").await;

        let err = register(State(state.clone()), Ok(register_body("a@x.io", "Eve", "other")))
            .await
            .err()
            .unwrap();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Email already exists");
        let still = state.users.find_by_email("a@x.io").await.unwrap().unwrap();
        assert_eq!(still.id, first.id);
        assert_eq!(still.name, "Ada");
    }

    #[tokio::test]
    async fn test_login_success_and_failures() {
        let state = test_state();
        let info = register_user(&state, "a@x.io").await;

        let Json(response) = login(State(state.clone()), Ok(login_body("a@x.io", "pw123456")))
            .await
            .unwrap();
        assert_eq!(response.user, info);
        assert_eq!(state.tokens.verify(&response.token).unwrap().sub, info.id);

        let wrong = login(State(state.clone()), Ok(login_body("a@x.io", "nope")))
            .await
            .err()
            .unwrap();
        let unknown = login(State(state.clone()), Ok(login_body("b@x.io", "pw123456")))
            .await
            .err()
            .unwrap();
        assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.public_message(), unknown.public_message());

        let missing = login(State(state), Ok(login_body("a@x.io", ""))).await.err().unwrap();
        assert_eq!(missing.public_message(), "Password is required");
    }

    #[tokio::test]
    async fn test_me_is_cached_and_invalidated_by_rename() {
        let state = test_state();
        let info = register_user(&state, "a@x.io").await;
        let caller = AuthUser { id: info.id, role: info.role };

        let Json(first) = get_me(State(state.clone()), caller).await.unwrap();
        assert_eq!(first.name, "Ada");
        assert!(state.profile_cache.get(&profile_key(info.id)).await.unwrap().is_some());

        set_name(
            State(state.clone()),
            caller,
            Ok(Json(SetNameRequest { name: "Grace".to_string() })),
        )
        .await
        .unwrap();
        assert!(state.profile_cache.get(&profile_key(info.id)).await.unwrap().is_none());

        let Json(second) = get_me(State(state), caller).await.unwrap();
        assert_eq!(second.name, "Grace");
    }

    #[tokio::test]
    async fn test_set_name_unknown_user() {
        let state = test_state();
        let ghost = AuthUser { id: 999, role: Role::Student };

        let err = set_name(
            State(state),
            ghost,
            Ok(Json(SetNameRequest { name: "Ghost".to_string() })),
        )
        .await
        .err()
        .unwrap();

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
