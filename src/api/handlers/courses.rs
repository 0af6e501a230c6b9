use crate::api::handlers::AppState;
use crate::api::models::{
    CourseListResponse, CreateCourseRequest, DeleteCourseRequest, EnrollmentListResponse,
    JoinCourseRequest, JoinCourseResponse,
};
use crate::auth::handlers::json_body;
use crate::auth::middleware::AuthUser;
use crate::auth::models::MessageResponse;
use crate::core::error::{AppError, Result};
use crate::db::repository::Repository;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const CODE_ATTEMPTS: usize = 5;
const CODE_TAKEN: &str = "Course code already in use";

fn generate_course_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn course_id_param(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    match path {
        Ok(Path(id)) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidRequest("Invalid course ID".to_string())),
    }
}

/// Handler for POST /courses - Professor creates a course
pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    body: std::result::Result<Json<CreateCourseRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let req = json_body(body)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("Course name is required".to_string()));
    }

    let requested_code = req
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    let course = match requested_code {
        Some(code) => state.courses.create(name, code, user.id).await?,
        None => {
            let mut attempt = 1;
            loop {
                match state.courses.create(name, &generate_course_code(), user.id).await {
                    Err(AppError::Conflict(msg)) if msg == CODE_TAKEN && attempt < CODE_ATTEMPTS => {
                        tracing::debug!(attempt, "Generated course code collided, retrying");
                        attempt += 1;
                    }
                    other => break other?,
                }
            }
        }
    };

    tracing::info!(course_id = course.id, professor_id = user.id, code = %course.code, "Course created");

    Ok((StatusCode::CREATED, Json(course)))
}

/// Handler for GET /courses - Courses owned by the calling professor
pub async fn list_my_courses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CourseListResponse>> {
    let courses = state.courses.find_by_professor(user.id).await?;
    Ok(Json(CourseListResponse { courses }))
}

/// Handler for DELETE /courses - Professor deletes one of their courses
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    body: std::result::Result<Json<DeleteCourseRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = json_body(body)?;
    let id = match req.id {
        Some(id) if id > 0 => id,
        _ => return Err(AppError::InvalidRequest("Invalid course ID".to_string())),
    };

    // Someone else's course reads as absent
    if state.courses.delete_owned(id, user.id).await? == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tracing::info!(course_id = id, professor_id = user.id, "Course deleted");
    Ok(Json(MessageResponse::new("Course deleted successfully")))
}

/// Handler for POST /courses/join - Student enrolls using a join code
pub async fn join_course(
    State(state): State<AppState>,
    user: AuthUser,
    body: std::result::Result<Json<JoinCourseRequest>, JsonRejection>,
) -> Result<Json<JoinCourseResponse>> {
    let req = json_body(body)?;
    let code = req.code.trim();
    if code.is_empty() {
        return Err(AppError::ValidationError("Course code is required".to_string()));
    }

    let course = state
        .courses
        .find_by_code(code)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    state.enrollments.enroll(user.id, course.id).await?;

    tracing::info!(course_id = course.id, user_id = user.id, "Student joined course");
    Ok(Json(JoinCourseResponse {
        message: "Joined course successfully".to_string(),
        course_id: course.id,
    }))
}

/// Handler for DELETE /courses/:id/leave - Student drops a course
pub async fn leave_course(
    State(state): State<AppState>,
    user: AuthUser,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let course_id = course_id_param(path)?;

    if state.enrollments.leave(user.id, course_id).await? == 0 {
        return Err(AppError::InvalidRequest("Enrollment not found".to_string()));
    }

    tracing::info!(course_id, user_id = user.id, "Student left course");
    Ok(Json(MessageResponse::new("Unenrolled course successfully")))
}

/// Handler for GET /enrollments - Courses the calling student is enrolled in
pub async fn list_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<EnrollmentListResponse>> {
    let courses = state.enrollments.find_for_student(user.id).await?;
    Ok(Json(EnrollmentListResponse { courses }))
}

/// Handler for GET /dev/courses - Every course, development only
pub async fn dev_list_courses(State(state): State<AppState>) -> Result<Json<CourseListResponse>> {
    let courses = state.courses.find_all().await?;
    Ok(Json(CourseListResponse { courses }))
}

/// Handler for DELETE /dev/courses/:id - Delete any course, development only
pub async fn dev_delete_course(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let id = course_id_param(path)?;

    if state.courses.delete(id).await? == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tracing::warn!(course_id = id, "Course deleted through dev route");
    Ok(Json(MessageResponse::new("Course deleted successfully")))
}
