use crate::db::models::{Course, EnrolledCourse};
use serde::{Deserialize, Serialize};

// Course API models

/// Request body for POST /courses
#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    #[serde(default)]
    pub name: String,
    /// Join code; one is generated when absent or blank
    #[serde(default)]
    pub code: Option<String>,
}

/// Request body for DELETE /courses
#[derive(Debug, Deserialize)]
pub struct DeleteCourseRequest {
    #[serde(default)]
    pub id: Option<i64>,
}

/// Request body for POST /courses/join
#[derive(Debug, Deserialize)]
pub struct JoinCourseRequest {
    #[serde(default)]
    pub code: String,
}

/// Response for POST /courses/join
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCourseResponse {
    pub message: String,
    pub course_id: i64,
}

/// Response for course listings
#[derive(Debug, Serialize, Deserialize)]
pub struct CourseListResponse {
    pub courses: Vec<Course>,
}

/// Response for GET /enrollments
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollmentListResponse {
    pub courses: Vec<EnrolledCourse>,
}
