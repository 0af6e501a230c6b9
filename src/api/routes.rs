//! API routes

use crate::api::handlers::{
    create_course, delete_course, dev_delete_course, dev_list_courses, health_check,
    join_course, leave_course, list_enrollments, list_my_courses, ping, AppState,
};
use crate::api::middleware::dev_only;
use crate::auth::handlers::{get_me, login, register, set_name};
use crate::auth::middleware::authenticate;
use crate::auth::role::{require_professor, require_student};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

/// Build the API routes
pub fn build_api_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/users/register", post(register))
        .route("/users/login", post(login));

    // Any authenticated caller
    let account_routes = Router::new()
        .route("/me", get(get_me))
        .route("/users/name", post(set_name))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let professor_routes = Router::new()
        .route(
            "/courses",
            post(create_course).get(list_my_courses).delete(delete_course),
        )
        .layer(middleware::from_fn(require_professor))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let student_routes = Router::new()
        .route("/courses/join", post(join_course))
        .route("/courses/:id/leave", delete(leave_course))
        .route("/enrollments", get(list_enrollments))
        .layer(middleware::from_fn(require_student))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    // Development-only maintenance routes, no authentication
    let dev_routes = Router::new()
        .route("/dev/courses", get(dev_list_courses))
        .route("/dev/courses/:id", delete(dev_delete_course))
        .layer(middleware::from_fn_with_state(state.clone(), dev_only));

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(professor_routes)
        .merge(student_routes)
        .merge(dev_routes)
        .with_state(state)
}
