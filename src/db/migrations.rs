//! Database migrations
//!
//! Versioned schema changes tracked in `schema_migrations`. Each version is
//! applied inside its own transaction.

use crate::core::error::Result;
use rusqlite::Connection;
use tracing::{info, warn};

/// Migration version tracking table
const MIGRATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Initial schema (version 1): accounts
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL,
    role INTEGER NOT NULL CHECK (role IN (1, 2)),
    created_at TEXT NOT NULL
);
"#;

/// Version 2: courses and enrollments
const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    code TEXT NOT NULL UNIQUE,
    professor_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (professor_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
    UNIQUE(user_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_courses_professor_id ON courses(professor_id);
CREATE INDEX IF NOT EXISTS idx_enrollments_user_id ON enrollments(user_id);
"#;

const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "Accounts", MIGRATION_V1),
    (2, "Courses and enrollments", MIGRATION_V2),
];

/// Run all pending database migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    info!("Running database migrations");

    conn.execute_batch(MIGRATION_TABLE)?;

    let current_version = current_version(conn)?;
    info!("Current database schema version: {}", current_version);

    for (version, description, sql) in MIGRATIONS {
        if current_version < *version {
            info!("Applying migration v{}: {}", version, description);
            apply_migration(conn, *version, sql)?;
        }
    }

    info!("Database migrations completed successfully");
    Ok(())
}

/// Highest applied schema version, 0 for a fresh database
pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply_migration(conn: &mut Connection, version: i64, sql: &str) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(sql).map_err(|e| {
        warn!("Migration v{} failed: {}", version, e);
        e
    })?;

    tx.execute("INSERT INTO schema_migrations (version) VALUES (?)", [version])?;
    tx.commit()?;

    info!("Migration v{} applied successfully", version);
    Ok(())
}
