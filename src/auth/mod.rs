//! Authentication module
//!
//! This module provides authentication functionality including:
//! - Account registration and login
//! - JWT token issuing and validation
//! - Password hashing and verification
//! - Authentication middleware and role gates

pub mod jwt;
pub mod password;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod role;

pub use jwt::{Claims, TokenError, TokenService};
pub use password::PasswordHasher;
pub use middleware::{authenticate, AuthUser};
pub use role::{require_professor, require_student};
pub use handlers::{get_me, login, register, set_name};
