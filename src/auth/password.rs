//! Password hashing and verification using bcrypt

use crate::core::error::{AppError, Result};

/// Salted one-way password hashing.
///
/// bcrypt embeds a fresh random salt in every digest and compares digests in
/// constant time.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::InternalError(format!("Failed to hash password: {}", e)))
    }

    /// Check a password against a stored digest. A malformed digest is a mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        match bcrypt::verify(password, digest) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password digest could not be parsed");
                false
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_async(&self, password: &str) -> Result<String> {
        let hasher = *self;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::TaskError(format!("Password hashing task panicked: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_async(&self, password: &str, digest: &str) -> Result<bool> {
        let hasher = *self;
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::TaskError(format!("Password verification task panicked: {}", e)))
    }
}
