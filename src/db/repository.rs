//! Repository pattern implementation for data access layer
//!
//! This module abstracts the SQL behind typed async operations. Uniqueness
//! (emails, course names and codes, one enrollment per student and course)
//! is enforced by table constraints; a violated constraint surfaces as
//! [`AppError::Conflict`].

use crate::core::error::{AppError, Result};
use crate::db::manager::DatabaseManager;
use crate::db::models::{Course, EnrolledCourse, NewUser, User};
use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row};
use std::sync::Arc;

/// Generic read access shared by the repositories
#[async_trait]
pub trait Repository<T>: Send + Sync {
    /// Find all entities
    async fn find_all(&self) -> Result<Vec<T>>;
}

/// Account storage used by the authentication layer
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Insert a user. A taken email yields [`AppError::Conflict`].
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Returns the number of rows changed (0 when the user does not exist)
    async fn update_name(&self, id: i64, name: &str) -> Result<usize>;
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn violated_column(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.rsplit(": ").next(),
        _ => None,
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const COURSE_COLUMNS: &str = "id, name, code, professor_id, created_at";

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        professor_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Repository for User entities
pub struct UserRepository {
    db: Arc<DatabaseManager>,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64> {
        self.db.execute(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        }).await
    }
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.db.execute(move |conn| {
            Ok(conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                [&email],
                user_from_row,
            ).optional()?)
        }).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.db.execute(move |conn| {
            Ok(conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                [id],
                user_from_row,
            ).optional()?)
        }).await
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        let user = user.clone();
        self.db.execute(move |conn| {
            let created_at = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO users (email, name, password_hash, role, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
                rusqlite::params![&user.email, &user.name, &user.password_hash, user.role, &created_at],
            ).map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Email already exists".to_string())
                } else {
                    AppError::DatabaseError(e)
                }
            })?;

            Ok(User {
                id: conn.last_insert_rowid(),
                email: user.email,
                name: user.name,
                password_hash: user.password_hash,
                role: user.role,
                created_at,
            })
        }).await
    }

    async fn update_name(&self, id: i64, name: &str) -> Result<usize> {
        let name = name.to_string();
        self.db.execute(move |conn| {
            Ok(conn.execute(
                "UPDATE users SET name = ? WHERE id = ?",
                rusqlite::params![&name, id],
            )?)
        }).await
    }
}

/// Repository for Course entities
pub struct CourseRepository {
    db: Arc<DatabaseManager>,
}

impl CourseRepository {
    /// Create a new CourseRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Insert a course owned by `professor_id`
    pub async fn create(&self, name: &str, code: &str, professor_id: i64) -> Result<Course> {
        let name = name.to_string();
        let code = code.to_string();
        self.db.execute(move |conn| {
            let created_at = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO courses (name, code, professor_id, created_at) VALUES (?, ?, ?, ?)",
                rusqlite::params![&name, &code, professor_id, &created_at],
            ).map_err(|e| {
                if !is_unique_violation(&e) {
                    return AppError::DatabaseError(e);
                }
                match violated_column(&e) {
                    Some("courses.code") => AppError::Conflict("Course code already in use".to_string()),
                    _ => AppError::Conflict("Course already exists".to_string()),
                }
            })?;

            Ok(Course {
                id: conn.last_insert_rowid(),
                name,
                code,
                professor_id,
                created_at,
            })
        }).await
    }

    /// Find a course by its join code
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Course>> {
        let code = code.to_string();
        self.db.execute(move |conn| {
            Ok(conn.query_row(
                &format!("SELECT {} FROM courses WHERE code = ?", COURSE_COLUMNS),
                [&code],
                course_from_row,
            ).optional()?)
        }).await
    }

    /// Courses owned by a professor, oldest first
    pub async fn find_by_professor(&self, professor_id: i64) -> Result<Vec<Course>> {
        self.db.execute(move |conn| {
            let mut stmt = conn.prepare(
                &format!("SELECT {} FROM courses WHERE professor_id = ? ORDER BY id", COURSE_COLUMNS)
            )?;
            let courses = stmt.query_map([professor_id], course_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(courses)
        }).await
    }

    /// Delete a course only if `professor_id` owns it. Returns rows deleted.
    pub async fn delete_owned(&self, id: i64, professor_id: i64) -> Result<usize> {
        self.db.execute(move |conn| {
            Ok(conn.execute(
                "DELETE FROM courses WHERE id = ? AND professor_id = ?",
                [id, professor_id],
            )?)
        }).await
    }

    /// Delete a course regardless of owner. Returns rows deleted.
    pub async fn delete(&self, id: i64) -> Result<usize> {
        self.db.execute(move |conn| {
            Ok(conn.execute("DELETE FROM courses WHERE id = ?", [id])?)
        }).await
    }
}

#[async_trait]
impl Repository<Course> for CourseRepository {
    async fn find_all(&self) -> Result<Vec<Course>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                &format!("SELECT {} FROM courses ORDER BY id", COURSE_COLUMNS)
            )?;
            let courses = stmt.query_map([], course_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(courses)
        }).await
    }
}

/// Repository for student enrollments
pub struct EnrollmentRepository {
    db: Arc<DatabaseManager>,
}

impl EnrollmentRepository {
    /// Create a new EnrollmentRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Enroll a student. A repeated enrollment yields [`AppError::Conflict`].
    pub async fn enroll(&self, user_id: i64, course_id: i64) -> Result<()> {
        self.db.execute(move |conn| {
            conn.execute(
                "INSERT INTO enrollments (user_id, course_id, created_at) VALUES (?, ?, ?)",
                rusqlite::params![user_id, course_id, chrono::Utc::now().to_rfc3339()],
            ).map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Already enrolled in this course".to_string())
                } else {
                    AppError::DatabaseError(e)
                }
            })?;
            Ok(())
        }).await
    }

    /// Remove an enrollment. Returns rows deleted.
    pub async fn leave(&self, user_id: i64, course_id: i64) -> Result<usize> {
        self.db.execute(move |conn| {
            Ok(conn.execute(
                "DELETE FROM enrollments WHERE user_id = ? AND course_id = ?",
                [user_id, course_id],
            )?)
        }).await
    }

    /// Courses a student is enrolled in, in enrollment order
    pub async fn find_for_student(&self, user_id: i64) -> Result<Vec<EnrolledCourse>> {
        self.db.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.code, e.created_at \
                 FROM enrollments e JOIN courses c ON c.id = e.course_id \
                 WHERE e.user_id = ? ORDER BY e.id"
            )?;
            let courses = stmt.query_map([user_id], |row| {
                Ok(EnrolledCourse {
                    course_id: row.get(0)?,
                    course_name: row.get(1)?,
                    course_code: row.get(2)?,
                    joined_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(courses)
        }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;

    fn setup() -> Arc<DatabaseManager> {
        Arc::new(DatabaseManager::new_in_memory().unwrap())
    }

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test User".to_string(),
            password_hash: "$2b$04$not-a-real-hash".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = UserRepository::new(setup());

        let created = repo.create(&new_user("a@x.com", Role::Professor)).await.unwrap();
        assert!(created.id > 0);

        let by_email = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.role, Role::Professor);

        let by_id = CredentialStore::find_by_id(&repo, created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");

        assert!(repo.find_by_email("b@x.com").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = UserRepository::new(setup());

        repo.create(&new_user("a@x.com", Role::Student)).await.unwrap();
        let err = repo.create(&new_user("a@x.com", Role::Professor)).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_name() {
        let repo = UserRepository::new(setup());
        let user = repo.create(&new_user("a@x.com", Role::Student)).await.unwrap();

        assert_eq!(repo.update_name(user.id, "Renamed").await.unwrap(), 1);
        assert_eq!(repo.update_name(user.id + 100, "Nobody").await.unwrap(), 0);

        let user = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.name, "Renamed");
    }

    #[tokio::test]
    async fn test_course_conflicts() {
        let db = setup();
        let users = UserRepository::new(db.clone());
        let courses = CourseRepository::new(db);
        let prof = users.create(&new_user("p@x.com", Role::Professor)).await.unwrap();

        courses.create("Algebra", "ALG101", prof.id).await.unwrap();

        let err = courses.create("Algebra", "ALG102", prof.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Course already exists"));

        let err = courses.create("Geometry", "ALG101", prof.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Course code already in use"));
    }

    #[tokio::test]
    async fn test_enrollment_lifecycle() {
        let db = setup();
        let users = UserRepository::new(db.clone());
        let courses = CourseRepository::new(db.clone());
        let enrollments = EnrollmentRepository::new(db);

        let prof = users.create(&new_user("p@x.com", Role::Professor)).await.unwrap();
        let student = users.create(&new_user("s@x.com", Role::Student)).await.unwrap();
        let course = courses.create("Algebra", "ALG101", prof.id).await.unwrap();

        enrollments.enroll(student.id, course.id).await.unwrap();
        let err = enrollments.enroll(student.id, course.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let listed = enrollments.find_for_student(student.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].course_code, "ALG101");

        assert_eq!(enrollments.leave(student.id, course.id).await.unwrap(), 1);
        assert_eq!(enrollments.leave(student.id, course.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleting_course_cascades_enrollments() {
        let db = setup();
        let users = UserRepository::new(db.clone());
        let courses = CourseRepository::new(db.clone());
        let enrollments = EnrollmentRepository::new(db);

        let prof = users.create(&new_user("p@x.com", Role::Professor)).await.unwrap();
        let other = users.create(&new_user("q@x.com", Role::Professor)).await.unwrap();
        let student = users.create(&new_user("s@x.com", Role::Student)).await.unwrap();
        let course = courses.create("Algebra", "ALG101", prof.id).await.unwrap();
        enrollments.enroll(student.id, course.id).await.unwrap();

        assert_eq!(courses.delete_owned(course.id, other.id).await.unwrap(), 0);
        assert_eq!(courses.delete_owned(course.id, prof.id).await.unwrap(), 1);

        assert!(enrollments.find_for_student(student.id).await.unwrap().is_empty());
        assert!(courses.find_all().await.unwrap().is_empty());
    }
}
