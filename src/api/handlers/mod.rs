pub mod courses;
pub mod system;

pub use courses::*;
pub use system::*;

use crate::auth::jwt::TokenService;
use crate::auth::password::PasswordHasher;
use crate::cache::ProfileCache;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::db::manager::DatabaseManager;
use crate::db::repository::{CourseRepository, CredentialStore, EnrollmentRepository, UserRepository};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub users: Arc<dyn CredentialStore>,
    pub courses: Arc<CourseRepository>,
    pub enrollments: Arc<EnrollmentRepository>,
    pub tokens: Arc<TokenService>,
    pub hasher: PasswordHasher,
    /// Digest verified against when a login names an unknown email, so both
    /// failure paths cost one bcrypt comparison
    pub dummy_digest: Arc<String>,
    pub profile_cache: Arc<dyn ProfileCache>,
    pub profile_ttl: Duration,
    pub config: Arc<Config>,
}

/// Password behind [`AppState::dummy_digest`]; no account can log in with it
const DUMMY_PASSWORD: &str = "conductor-dummy-password";

impl AppState {
    /// Build the shared state. The dummy digest is hashed on the blocking pool.
    pub async fn new(
        config: Arc<Config>,
        db: Arc<DatabaseManager>,
        profile_cache: Arc<dyn ProfileCache>,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(config.security.bcrypt_cost);
        let dummy_digest = hasher.hash_async(DUMMY_PASSWORD).await?;

        Self::with_dummy_digest(config, db, profile_cache, dummy_digest)
    }

    fn with_dummy_digest(
        config: Arc<Config>,
        db: Arc<DatabaseManager>,
        profile_cache: Arc<dyn ProfileCache>,
        dummy_digest: String,
    ) -> Result<Self> {
        let tokens = TokenService::new(
            &config.security.jwt_secret,
            config.security.token_ttl_hours,
        )?;
        let hasher = PasswordHasher::new(config.security.bcrypt_cost);

        Ok(Self {
            users: Arc::new(UserRepository::new(db.clone())),
            courses: Arc::new(CourseRepository::new(db.clone())),
            enrollments: Arc::new(EnrollmentRepository::new(db.clone())),
            db,
            tokens: Arc::new(tokens),
            hasher,
            dummy_digest: Arc::new(dummy_digest),
            profile_cache,
            profile_ttl: Duration::from_secs(config.cache.profile_ttl),
            config,
        })
    }
}
