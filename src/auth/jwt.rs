//! JWT token generation and validation
//!
//! Tokens are HS256-signed and self-contained: nothing is stored server side,
//! so a token cannot be revoked and stays valid until `exp`. Logging out means
//! the client discards it.

use crate::core::error::{AppError, Result};
use crate::db::models::Role;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;

/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub role: Role,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// Why a presented token was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed: {0}")]
    Malformed(String),
}

/// Issues and verifies bearer tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service. An empty or blank secret is refused.
    pub fn new(secret: &str, ttl_hours: u64) -> Result<Self> {
        if secret.trim().is_empty() {
            return Err(AppError::ConfigError("JWT secret is not configured".to_string()));
        }
        if ttl_hours == 0 || ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(AppError::ConfigError(format!(
                "Token lifetime must be between 1 and {} hours",
                MAX_TOKEN_TTL_HOURS
            )));
        }
        let ttl = i64::try_from(ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| AppError::ConfigError("Token lifetime out of range".to_string()))?;

        // `sub` is numeric, and jsonwebtoken only recognises a string `sub` as
        // present, so it is checked after decoding instead.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Generate a token for a user, valid from now
    pub fn issue(&self, subject: i64, role: Role) -> Result<String> {
        self.issue_at(subject, role, Utc::now())
    }

    /// Generate a token as if issued at `issued_at`
    pub fn issue_at(&self, subject: i64, role: Role, issued_at: DateTime<Utc>) -> Result<String> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::InternalError("Token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: subject,
            role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to create token: {}", e)))
    }

    /// Validate a token and extract its claims.
    ///
    /// The signature is checked before any claim is read, so `sub` and `role`
    /// are only returned from tokens this service signed.
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        if claims.sub <= 0 {
            return Err(TokenError::Malformed("subject is not a user id".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service() -> TokenService {
        TokenService::new("test-secret-key", DEFAULT_TOKEN_TTL_HOURS).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service();
        let token = tokens.issue(42, Role::Professor).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Professor);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_empty_secret_is_refused() {
        assert!(TokenService::new("", 24).is_err());
        assert!(TokenService::new("   ", 24).is_err());
        assert!(TokenService::new("secret", 0).is_err());
    }

    #[test]
    fn test_oversized_lifetime_is_refused() {
        assert!(TokenService::new("secret", MAX_TOKEN_TTL_HOURS).is_ok());
        assert!(TokenService::new("secret", MAX_TOKEN_TTL_HOURS + 1).is_err());
        assert!(TokenService::new("secret", 9_999_999_999_999_999).is_err());
    }

    #[test]
    fn test_issue_near_end_of_time_fails_cleanly() {
        let tokens = service();
        let issued_at = DateTime::<Utc>::MAX_UTC - Duration::hours(1);

        assert!(matches!(
            tokens.issue_at(7, Role::Student, issued_at),
            Err(AppError::InternalError(_))
        ));
    }

    #[test]
    fn test_fresh_token_round_trips_for_every_role() {
        let tokens = TokenService::new("s3cret", 24).unwrap();

        for role in [Role::Student, Role::Professor] {
            let token = tokens.issue(42, role).unwrap();
            assert_eq!(tokens.verify(&token).map(|c| (c.sub, c.role)), Ok((42, role)));
        }
    }

    #[test]
    fn test_non_positive_subject_is_malformed() {
        let tokens = service();
        let token = tokens.issue(0, Role::Student).unwrap();

        assert!(matches!(tokens.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let tokens = service();
        let token = tokens.issue(7, Role::Student).unwrap();

        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut bytes = signature.as_bytes().to_vec();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{}.{}", head, String::from_utf8(bytes).unwrap());

        assert_eq!(tokens.verify(&tampered), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_forged_role_is_rejected() {
        let tokens = service();
        let forger = TokenService::new("someone-elses-secret", 24).unwrap();
        let forged = forger.issue(7, Role::Professor).unwrap();

        assert_eq!(tokens.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = service();
        let issued_at = Utc::now() - Duration::hours(25);
        let token = tokens.issue_at(7, Role::Student, issued_at).unwrap();

        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_inside_window_is_accepted() {
        let tokens = service();
        let issued_at = Utc::now() - Duration::hours(23);
        let token = tokens.issue_at(7, Role::Student, issued_at).unwrap();

        assert!(tokens.verify(&token).is_ok());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = service();

        assert!(matches!(tokens.verify("garbage"), Err(TokenError::Malformed(_))));
        assert!(matches!(tokens.verify(""), Err(TokenError::Malformed(_))));
        assert!(matches!(tokens.verify("a.b.c"), Err(TokenError::Malformed(_))));
    }

    proptest! {
        #[test]
        fn prop_issue_verify_recovers_subject_and_role(subject in 1i64..i64::MAX, professor in any::<bool>()) {
            let tokens = service();
            let role = if professor { Role::Professor } else { Role::Student };

            let claims = tokens.verify(&tokens.issue(subject, role).unwrap()).unwrap();
            prop_assert_eq!(claims.sub, subject);
            prop_assert_eq!(claims.role, role);
        }
    }
}
