//! Conductor Backend Library
//!
//! Account and course-enrollment service: credential storage, bearer-token
//! authentication, role-gated course management and the HTTP API around them.

pub mod api;
pub mod auth;
pub mod cache;
pub mod core;
pub mod db;

// Re-export commonly used types
pub use api::ApiServer;
pub use crate::core::{AppError, Config};
pub use db::DatabaseManager;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
